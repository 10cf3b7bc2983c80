//! Configuration for the game engine.
//!
//! Strongly-typed sections that map to `growlab.toml`. Every section has
//! defaults, so a file only needs to name what it overrides.
//!
//! ## Configuration Hierarchy
//!
//! 1. Default values (hardcoded in `Default` impls)
//! 2. `growlab.toml` (overrides defaults)
//! 3. `RUST_LOG` for the log filter only
//!
//! ## Example `growlab.toml`
//!
//! ```toml
//! [world]
//! seed = 42
//! deterministic = true
//!
//! [weather]
//! seasonal_chance = 0.2
//!
//! [lifecycle]
//! tick_minutes = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: Option<u64>,
    pub deterministic: bool,
    /// Tokens credited to accounts created by the runner.
    pub starting_tokens: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            deterministic: false,
            starting_tokens: 500,
        }
    }
}

/// Weather timeline parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    /// Chance per cycle of a seasonal event.
    pub seasonal_chance: f64,
    /// Chance per cycle of a severe extreme event.
    pub extreme_chance: f64,
    pub forecast_hours: u32,
    pub max_duration_hours: u32,
    /// Wall-clock seconds between auto-cycle ticks in daemon mode.
    pub cycle_interval_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            seasonal_chance: 0.20,
            extreme_chance: 0.05,
            forecast_hours: 24,
            max_duration_hours: 168,
            cycle_interval_secs: 3600,
        }
    }
}

/// Breeding and discovery economics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BreedingConfig {
    pub breed_cost: u64,
    pub discovery_cost: u64,
    /// Weight of the lower-rarity parent in the offspring rarity roll.
    pub lower_parent_weight: f64,
    /// Chance that offspring land one tier above the higher parent.
    pub upgrade_chance: f64,
    pub history_limit: usize,
}

impl Default for BreedingConfig {
    fn default() -> Self {
        Self {
            breed_cost: 50,
            discovery_cost: 10,
            lower_parent_weight: 0.3,
            upgrade_chance: 0.1,
            history_limit: 50,
        }
    }
}

/// Plant growth, disease and harvest tuning.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub tick_minutes: u32,
    /// Growth points per hour in each stage.
    pub seedling_rate: f64,
    pub growing_rate: f64,
    pub flowering_rate: f64,
    /// Progress at which each stage begins.
    pub growing_threshold: f64,
    pub flowering_threshold: f64,
    pub ready_threshold: f64,
    /// Exposure per hour at a net disease risk of 1.0.
    pub base_disease_accrual: f64,
    pub death_threshold: f64,
    /// Experience per rarity value on harvest.
    pub harvest_experience: u64,
    pub water_growth_bonus: f64,
    pub treatment_cost: u64,
    /// Fraction of exposure removed by a treatment.
    pub treatment_reduction: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_minutes: 60,
            seedling_rate: 2.0,
            growing_rate: 4.0,
            flowering_rate: 1.5,
            growing_threshold: 100.0,
            flowering_threshold: 500.0,
            ready_threshold: 800.0,
            base_disease_accrual: 2.0,
            death_threshold: 100.0,
            harvest_experience: 20,
            water_growth_bonus: 5.0,
            treatment_cost: 15,
            treatment_reduction: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct GameConfig {
    pub world: WorldConfig,
    pub weather: WeatherConfig,
    pub breeding: BreedingConfig,
    pub lifecycle: LifecycleConfig,
    pub logging: LoggingConfig,
}

fn is_probability(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl GameConfig {
    /// Validates configuration values are within acceptable ranges.
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Weather validation
        anyhow::ensure!(
            is_probability(self.weather.seasonal_chance),
            "Seasonal chance must be in [0.0, 1.0]"
        );
        anyhow::ensure!(
            is_probability(self.weather.extreme_chance),
            "Extreme chance must be in [0.0, 1.0]"
        );
        anyhow::ensure!(
            self.weather.forecast_hours > 0,
            "Forecast window must be positive"
        );
        anyhow::ensure!(
            self.weather.max_duration_hours > 0,
            "Max event duration must be positive"
        );
        anyhow::ensure!(
            self.weather.cycle_interval_secs > 0,
            "Cycle interval must be positive"
        );

        // Breeding validation
        anyhow::ensure!(
            is_probability(self.breeding.lower_parent_weight),
            "Lower parent weight must be in [0.0, 1.0]"
        );
        anyhow::ensure!(
            is_probability(self.breeding.upgrade_chance),
            "Upgrade chance must be in [0.0, 1.0]"
        );
        anyhow::ensure!(
            self.breeding.lower_parent_weight + self.breeding.upgrade_chance <= 1.0,
            "Lower parent weight and upgrade chance must sum to at most 1.0"
        );
        anyhow::ensure!(
            self.breeding.history_limit > 0,
            "History limit must be positive"
        );

        // Lifecycle validation
        let lc = &self.lifecycle;
        anyhow::ensure!(lc.tick_minutes > 0, "Tick length must be positive");
        anyhow::ensure!(
            lc.tick_minutes <= 24 * 60,
            "Tick length too large (max one day)"
        );
        anyhow::ensure!(
            lc.seedling_rate > 0.0 && lc.growing_rate > 0.0 && lc.flowering_rate > 0.0,
            "Stage growth rates must be positive"
        );
        anyhow::ensure!(
            0.0 < lc.growing_threshold
                && lc.growing_threshold < lc.flowering_threshold
                && lc.flowering_threshold < lc.ready_threshold,
            "Stage thresholds must be positive and strictly increasing"
        );
        anyhow::ensure!(
            lc.base_disease_accrual >= 0.0,
            "Disease accrual must be non-negative"
        );
        anyhow::ensure!(lc.death_threshold > 0.0, "Death threshold must be positive");
        anyhow::ensure!(
            lc.water_growth_bonus >= 0.0,
            "Water bonus must be non-negative"
        );
        anyhow::ensure!(
            is_probability(lc.treatment_reduction),
            "Treatment reduction must be in [0.0, 1.0]"
        );

        anyhow::ensure!(
            !self.logging.level.trim().is_empty(),
            "Log level must not be empty"
        );

        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Hash of the rule-affecting sections, for comparing runs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.weather).as_bytes());
        hasher.update(format!("{:?}", self.breeding).as_bytes());
        hasher.update(format!("{:?}", self.lifecycle).as_bytes());
        hex::encode(hasher.finalize())
    }
}
