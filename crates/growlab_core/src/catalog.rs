//! Starter strains used to seed a fresh world.

use crate::context::next_id;
use growlab_data::{Rarity, Traits, Variant};
use rand::Rng;

struct Template {
    name: &'static str,
    rarity: Rarity,
    stability: f64,
    vigor: f64,
    traits: [f32; 4],
    seed_cost: u64,
    required_level: u32,
    base_yield: f64,
}

const STARTERS: [Template; 10] = [
    Template {
        name: "Meadow Haze",
        rarity: Rarity::Common,
        stability: 0.8,
        vigor: 0.4,
        traits: [0.3, 0.6, 0.5, 0.4],
        seed_cost: 10,
        required_level: 1,
        base_yield: 80.0,
    },
    Template {
        name: "Backyard Kush",
        rarity: Rarity::Common,
        stability: 0.7,
        vigor: 0.5,
        traits: [0.4, 0.5, 0.6, 0.3],
        seed_cost: 12,
        required_level: 1,
        base_yield: 90.0,
    },
    Template {
        name: "Dockside Dream",
        rarity: Rarity::Common,
        stability: 0.6,
        vigor: 0.6,
        traits: [0.4, 0.4, 0.5, 0.6],
        seed_cost: 15,
        required_level: 1,
        base_yield: 95.0,
    },
    Template {
        name: "Brooklyn Bloom",
        rarity: Rarity::Uncommon,
        stability: 0.6,
        vigor: 0.6,
        traits: [0.5, 0.5, 0.6, 0.6],
        seed_cost: 30,
        required_level: 2,
        base_yield: 120.0,
    },
    Template {
        name: "Harbor Lights",
        rarity: Rarity::Uncommon,
        stability: 0.5,
        vigor: 0.7,
        traits: [0.6, 0.4, 0.5, 0.7],
        seed_cost: 35,
        required_level: 2,
        base_yield: 125.0,
    },
    Template {
        name: "Subway Sativa",
        rarity: Rarity::Rare,
        stability: 0.5,
        vigor: 0.7,
        traits: [0.7, 0.5, 0.6, 0.6],
        seed_cost: 60,
        required_level: 4,
        base_yield: 160.0,
    },
    Template {
        name: "Skyline Indica",
        rarity: Rarity::Rare,
        stability: 0.6,
        vigor: 0.5,
        traits: [0.6, 0.7, 0.6, 0.5],
        seed_cost: 65,
        required_level: 4,
        base_yield: 170.0,
    },
    Template {
        name: "Empire Gold",
        rarity: Rarity::Epic,
        stability: 0.4,
        vigor: 0.8,
        traits: [0.8, 0.6, 0.7, 0.7],
        seed_cost: 120,
        required_level: 7,
        base_yield: 220.0,
    },
    Template {
        name: "Midnight Terrace",
        rarity: Rarity::Epic,
        stability: 0.5,
        vigor: 0.7,
        traits: [0.7, 0.7, 0.7, 0.8],
        seed_cost: 130,
        required_level: 7,
        base_yield: 230.0,
    },
    Template {
        name: "Liberty Legend",
        rarity: Rarity::Legendary,
        stability: 0.3,
        vigor: 0.9,
        traits: [0.9, 0.7, 0.8, 0.9],
        seed_cost: 250,
        required_level: 10,
        base_yield: 300.0,
    },
];

/// The starter strains, all discoverable, with ids drawn from `rng`.
pub fn starter_variants<R: Rng + ?Sized>(rng: &mut R) -> Vec<Variant> {
    STARTERS
        .iter()
        .map(|t| Variant {
            id: next_id(rng),
            name: t.name.to_string(),
            rarity: t.rarity,
            stability: t.stability,
            vigor: t.vigor,
            traits: Traits::from_array(t.traits),
            discoverable: true,
            seed_cost: t.seed_cost,
            required_level: t.required_level,
            base_yield: t.base_yield,
            parents: None,
        })
        .collect()
}
