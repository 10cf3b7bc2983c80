use super::ParseEnumError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Rarity tier of a genetics variant. The derive order is the tier order:
/// `Common < Uncommon < Rare < Epic < Legendary`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Display and breeding metadata for one rarity tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RarityInfo {
    pub rarity: Rarity,
    pub name: &'static str,
    pub color: &'static str,
    pub breeding_bonus: u32,
    /// Base breeding success rate in percent.
    pub base_success_rate: f64,
}

/// The rarity table. Every base rate used by breeding is read from here.
pub const RARITY_CATALOG: [RarityInfo; 5] = [
    RarityInfo {
        rarity: Rarity::Common,
        name: "Common",
        color: "#6B7280",
        breeding_bonus: 0,
        base_success_rate: 70.0,
    },
    RarityInfo {
        rarity: Rarity::Uncommon,
        name: "Uncommon",
        color: "#10B981",
        breeding_bonus: 5,
        base_success_rate: 60.0,
    },
    RarityInfo {
        rarity: Rarity::Rare,
        name: "Rare",
        color: "#3B82F6",
        breeding_bonus: 10,
        base_success_rate: 45.0,
    },
    RarityInfo {
        rarity: Rarity::Epic,
        name: "Epic",
        color: "#8B5CF6",
        breeding_bonus: 15,
        base_success_rate: 30.0,
    },
    RarityInfo {
        rarity: Rarity::Legendary,
        name: "Legendary",
        color: "#F59E0B",
        breeding_bonus: 25,
        base_success_rate: 15.0,
    },
];

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    #[must_use]
    pub fn info(self) -> &'static RarityInfo {
        &RARITY_CATALOG[self.index()]
    }

    #[must_use]
    pub fn base_success_rate(self) -> f64 {
        self.info().base_success_rate
    }

    /// 1 for common up to 5 for legendary.
    #[must_use]
    pub fn value(self) -> u32 {
        self.index() as u32 + 1
    }

    #[must_use]
    pub fn next(self) -> Option<Rarity> {
        Self::ALL.get(self.index() + 1).copied()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    fn index(self) -> usize {
        match self {
            Rarity::Common => 0,
            Rarity::Uncommon => 1,
            Rarity::Rare => 2,
            Rarity::Epic => 3,
            Rarity::Legendary => 4,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("rarity", s))
    }
}

/// Heritable trait scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    pub potency: f32,
    pub resistance: f32,
    pub yield_bias: f32,
    pub aroma: f32,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            potency: 0.5,
            resistance: 0.5,
            yield_bias: 0.5,
            aroma: 0.5,
        }
    }
}

impl Traits {
    #[must_use]
    pub fn as_array(&self) -> [f32; 4] {
        [self.potency, self.resistance, self.yield_bias, self.aroma]
    }

    #[must_use]
    pub fn from_array(values: [f32; 4]) -> Self {
        Self {
            potency: values[0],
            resistance: values[1],
            yield_bias: values[2],
            aroma: values[3],
        }
    }

    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.as_array().iter().all(|v| (0.0..=1.0).contains(v))
    }
}

/// A catalog entry describing one strain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub name: String,
    pub rarity: Rarity,
    pub stability: f64,
    pub vigor: f64,
    pub traits: Traits,
    pub discoverable: bool,
    pub seed_cost: u64,
    pub required_level: u32,
    /// Harvest yield in grams under neutral weather.
    pub base_yield: f64,
    /// Parent variant ids for bred strains.
    pub parents: Option<(Uuid, Uuid)>,
}

impl Variant {
    #[must_use]
    pub fn is_bred(&self) -> bool {
        self.parents.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMethod {
    Bred,
    WildDiscovery,
    Granted,
}

/// A player's claim on a variant. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    pub player_id: Uuid,
    pub variant_id: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub method: AcquisitionMethod,
    /// 0 for natural strains, >0 for bred ones.
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedingRecord {
    pub id: Uuid,
    pub player_id: Uuid,
    pub parent1_id: Uuid,
    pub parent2_id: Uuid,
    pub offspring_id: Option<Uuid>,
    pub success: bool,
    /// Averaged parent success rate, in percent.
    pub success_rate: f64,
    pub bred_at: DateTime<Utc>,
}

/// How hard a player searches a location for wild genetics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    #[must_use]
    pub fn base_rate(self) -> f64 {
        match self {
            Effort::Low => 0.10,
            Effort::Medium => 0.20,
            Effort::High => 0.35,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effort {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            other => Err(ParseEnumError::new("search effort", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub id: Uuid,
    pub player_id: Uuid,
    pub location_id: Uuid,
    pub effort: Effort,
    pub rate: f64,
    pub variant_id: Option<Uuid>,
    pub attempted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_order_matches_catalog() {
        for pair in RARITY_CATALOG.windows(2) {
            assert!(pair[0].rarity < pair[1].rarity);
            assert!(pair[0].base_success_rate > pair[1].base_success_rate);
        }
        for rarity in Rarity::ALL {
            assert_eq!(rarity.info().rarity, rarity);
        }
    }

    #[test]
    fn test_rarity_value_and_next() {
        assert_eq!(Rarity::Common.value(), 1);
        assert_eq!(Rarity::Legendary.value(), 5);
        assert_eq!(Rarity::Epic.next(), Some(Rarity::Legendary));
        assert_eq!(Rarity::Legendary.next(), None);
    }

    #[test]
    fn test_parse_rarity_and_effort() {
        assert_eq!("rare".parse::<Rarity>(), Ok(Rarity::Rare));
        assert!("mythic".parse::<Rarity>().is_err());
        assert_eq!("high".parse::<Effort>(), Ok(Effort::High));
        let err = "extreme".parse::<Effort>().unwrap_err();
        assert_eq!(err.kind, "search effort");
    }

    #[test]
    fn test_rarity_serializes_snake_case() {
        let json = serde_json::to_string(&Rarity::Legendary).unwrap();
        assert_eq!(json, "\"legendary\"");
        let method = serde_json::to_string(&AcquisitionMethod::WildDiscovery).unwrap();
        assert_eq!(method, "\"wild_discovery\"");
    }
}
