use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantState {
    Seedling,
    Growing,
    Flowering,
    Ready,
    Harvested,
    Dead,
}

impl PlantState {
    /// The next stage on the growth path, if any.
    #[must_use]
    pub fn next(self) -> Option<PlantState> {
        match self {
            PlantState::Seedling => Some(PlantState::Growing),
            PlantState::Growing => Some(PlantState::Flowering),
            PlantState::Flowering => Some(PlantState::Ready),
            PlantState::Ready => Some(PlantState::Harvested),
            PlantState::Harvested | PlantState::Dead => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PlantState::Harvested | PlantState::Dead)
    }

    /// Whether moving from `self` to `to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: PlantState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == PlantState::Dead || self.next() == Some(to)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlantState::Seedling => "seedling",
            PlantState::Growing => "growing",
            PlantState::Flowering => "flowering",
            PlantState::Ready => "ready",
            PlantState::Harvested => "harvested",
            PlantState::Dead => "dead",
        }
    }
}

impl fmt::Display for PlantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: Uuid,
    pub player_id: Uuid,
    pub variant_id: Uuid,
    pub location_id: Uuid,
    pub state: PlantState,
    pub planted_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub growth_progress: f64,
    pub disease_exposure: f64,
    pub harvested_at: Option<DateTime<Utc>>,
    pub died_at: Option<DateTime<Utc>>,
    pub harvest_yield: Option<f64>,
    /// Bumped on every stored write.
    pub revision: u64,
}

impl Plant {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == PlantState::Ready
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Moves to `to` when the state machine allows it. Returns whether the
    /// state changed.
    pub fn transition_to(&mut self, to: PlantState) -> bool {
        if !self.state.can_transition_to(to) {
            return false;
        }
        self.state = to;
        true
    }
}
