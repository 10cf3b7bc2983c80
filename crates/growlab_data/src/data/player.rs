use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EXPERIENCE_PER_LEVEL: u64 = 1000;

/// The slice of a player account the game engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub tokens: u64,
    pub experience: u64,
    pub level: u32,
}

impl Player {
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, tokens: u64) -> Self {
        Self {
            id,
            name: name.into(),
            tokens,
            experience: 0,
            level: 1,
        }
    }

    #[must_use]
    pub fn level_for_experience(experience: u64) -> u32 {
        u32::try_from(1 + experience / EXPERIENCE_PER_LEVEL).unwrap_or(u32::MAX)
    }

    pub fn gain_experience(&mut self, amount: u64) {
        self.experience = self.experience.saturating_add(amount);
        self.level = self.level.max(Self::level_for_experience(self.experience));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SeedPurchase,
    BreedingFee,
    DiscoveryFee,
    Treatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub player_id: Uuid,
    pub kind: TransactionKind,
    /// Negative for spending.
    pub amount: i64,
    pub description: String,
    pub reference_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}
