//! Error taxonomy for the game engine.
//!
//! Only genuine failures live here. Probabilistic misses (a failed breeding
//! roll, an empty discovery search) are successful calls whose outcome type
//! says what happened.

use growlab_data::{ParseEnumError, PlantState};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    /// Malformed input: bad enum value, self-breeding, out-of-range number.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The player does not own a genetics variant the command needs.
    #[error("Player {player_id} does not own variant {variant_id}")]
    NotOwned { player_id: Uuid, variant_id: Uuid },

    /// The player may not act on another player's entity.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient funds: need {required} tokens, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Level too low: need level {required}, player is level {actual}")]
    LevelTooLow { required: u32, actual: u32 },

    /// A state-machine precondition does not hold.
    #[error("Not ready: plant is {state}")]
    NotReady { state: PlantState },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, GameError>;

impl GameError {
    #[must_use]
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[must_use]
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    #[must_use]
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    #[must_use]
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable tag for callers that map failures onto transport codes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::InvalidArgument(_) => "invalid_argument",
            GameError::NotFound(_) => "not_found",
            GameError::NotOwned { .. } => "not_owned",
            GameError::Forbidden(_) => "forbidden",
            GameError::InsufficientFunds { .. } => "insufficient_funds",
            GameError::LevelTooLow { .. } => "level_too_low",
            GameError::NotReady { .. } => "not_ready",
            GameError::Conflict(_) => "conflict",
            GameError::Storage(_) => "storage",
        }
    }
}

impl From<ParseEnumError> for GameError {
    fn from(err: ParseEnumError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
