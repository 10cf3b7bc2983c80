//! # Growlab Core
//!
//! The game simulation engine behind growlab's grow-and-sell loop.
//!
//! This crate contains the rules and the services that apply them:
//! - Weather timeline with seasonal and extreme auto-generation
//! - Modifier composition from concurrently active weather effects
//! - Genetics catalog, ownership queries and breeding success rates
//! - Probabilistic breeding and wild discovery
//! - Lazy plant growth, disease and harvest
//! - Metrics collection and structured logging
//!
//! ## Architecture
//!
//! Every service receives a [`context::GameContext`] holding the store, the
//! clock, the configuration and the metrics sink. There are no globals:
//! - **Injected time**: [`clock::Clock`] with a manual clock for tests and headless runs
//! - **Seeded randomness**: one `ChaCha8Rng` stream per service, plus `*_with_rng` variants
//! - **Atomic writes**: each command commits one [`store::WriteBatch`]
//!
//! ## Example
//!
//! ```
//! use growlab_core::modifiers::{compose, EffectModifiers};
//! use growlab_core::weather::EffectProfile;
//! use growlab_data::{Severity, WeatherType};
//!
//! let heat = EffectProfile::resolve(WeatherType::HeatWave, Severity::Severe).modifiers;
//! let sun = EffectProfile::resolve(WeatherType::Sunny, Severity::Mild).modifiers;
//! let net = compose(&[heat, sun]);
//! assert!(net.growth < 1.0);
//! assert_eq!(compose(&Vec::<EffectModifiers>::new()).growth, 1.0);
//! ```

/// Breeding and wild discovery
pub mod breeding;
/// Starter strain catalog
pub mod catalog;
/// Injected time source
pub mod clock;
/// Configuration management for game parameters
pub mod config;
/// Shared service dependencies and RNG streams
pub mod context;
/// Error types for game commands
pub mod error;
/// Genetics catalog and ownership queries
pub mod genetics;
/// Plant lifecycle state machine
pub mod lifecycle;
/// Metrics collection and logging setup
pub mod metrics;
/// Weather modifier composition
pub mod modifiers;
/// Background weather auto-cycle
pub mod scheduler;
/// Storage trait, write batches and the in-memory store
pub mod store;
/// Weather timeline and effect views
pub mod weather;

pub use error::{GameError, Result};
