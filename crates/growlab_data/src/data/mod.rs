pub mod genetics;
pub mod plant;
pub mod player;
pub mod weather;

use thiserror::Error;

/// Returned when a string does not name a member of one of the fixed
/// enumerations (weather type, severity, rarity, effort, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    #[must_use]
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
