//! # Growlab Data
//!
//! Plain data model shared by every growlab crate: genetics variants and
//! ownership, breeding/discovery records, weather events, plant instances and
//! player accounts. Types here carry no game logic beyond small enum helpers;
//! the rules live in `growlab_core`.

pub mod data;

pub use data::genetics::{
    AcquisitionMethod, BreedingRecord, DiscoveryRecord, Effort, Ownership, Rarity, RarityInfo,
    Traits, Variant, RARITY_CATALOG,
};
pub use data::plant::{Plant, PlantState};
pub use data::player::{Player, Transaction, TransactionKind, EXPERIENCE_PER_LEVEL};
pub use data::weather::{DiseaseKind, EventOrigin, Severity, WeatherEvent, WeatherType};
pub use data::ParseEnumError;
