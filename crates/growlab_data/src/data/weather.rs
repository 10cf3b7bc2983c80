use super::ParseEnumError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    HeatWave,
    ColdSnap,
    RainStorm,
    Drought,
    Sunny,
    Overcast,
    Windy,
}

impl WeatherType {
    pub const ALL: [WeatherType; 7] = [
        WeatherType::HeatWave,
        WeatherType::ColdSnap,
        WeatherType::RainStorm,
        WeatherType::Drought,
        WeatherType::Sunny,
        WeatherType::Overcast,
        WeatherType::Windy,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherType::HeatWave => "heat_wave",
            WeatherType::ColdSnap => "cold_snap",
            WeatherType::RainStorm => "rain_storm",
            WeatherType::Drought => "drought",
            WeatherType::Sunny => "sunny",
            WeatherType::Overcast => "overcast",
            WeatherType::Windy => "windy",
        }
    }

    /// Diseases this weather tends to cause. Wet weather can bring either
    /// mold or root rot.
    #[must_use]
    pub fn diseases(self) -> &'static [DiseaseKind] {
        match self {
            WeatherType::RainStorm => &[DiseaseKind::Mold, DiseaseKind::RootRot],
            WeatherType::HeatWave => &[DiseaseKind::HeatStress],
            WeatherType::Drought => &[DiseaseKind::NutrientDeficiency],
            WeatherType::ColdSnap => &[DiseaseKind::ColdStress],
            WeatherType::Sunny | WeatherType::Overcast | WeatherType::Windy => {
                &[DiseaseKind::GeneralStress]
            }
        }
    }
}

impl fmt::Display for WeatherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("weather type", s))
    }
}

/// Condition a plant is exposed to under a weather type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseKind {
    Mold,
    RootRot,
    HeatStress,
    NutrientDeficiency,
    ColdStress,
    GeneralStress,
}

impl DiseaseKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiseaseKind::Mold => "mold",
            DiseaseKind::RootRot => "root_rot",
            DiseaseKind::HeatStress => "heat_stress",
            DiseaseKind::NutrientDeficiency => "nutrient_deficiency",
            DiseaseKind::ColdStress => "cold_stress",
            DiseaseKind::GeneralStress => "general_stress",
        }
    }
}

impl fmt::Display for DiseaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
        Severity::Extreme,
    ];

    /// Scale applied to a weather type's base modifiers.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Severity::Mild => 0.5,
            Severity::Moderate => 1.0,
            Severity::Severe => 1.5,
            Severity::Extreme => 2.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Extreme => "extreme",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("severity", s))
    }
}

/// What created a weather event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    Manual,
    Seasonal,
    Extreme,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherEvent {
    pub id: Uuid,
    pub kind: WeatherType,
    pub severity: Severity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: String,
    pub origin: EventOrigin,
    /// Set by manual termination or by expiry.
    pub ended_at: Option<DateTime<Utc>>,
}

impl WeatherEvent {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn duration_hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }

    /// The instant the event stops contributing effects.
    #[must_use]
    pub fn effective_end(&self) -> DateTime<Utc> {
        match self.ended_at {
            Some(ended) if ended < self.end => ended,
            _ => self.end,
        }
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    #[must_use]
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.effective_end()
    }

    /// True once the scheduled window is over, whether or not anyone has
    /// recorded the expiry yet.
    #[must_use]
    pub fn has_elapsed(&self, at: DateTime<Utc>) -> bool {
        at >= self.end
    }

    #[must_use]
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && self.effective_end() > from
    }
}
