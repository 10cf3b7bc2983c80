//! Combines concurrently active weather effects into one multiplier set.

use serde::{Deserialize, Serialize};

/// The signed adjustments one effect applies relative to baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectModifiers {
    pub growth: f64,
    pub yield_rate: f64,
    pub disease_risk: f64,
}

impl EffectModifiers {
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            growth: self.growth * factor,
            yield_rate: self.yield_rate * factor,
            disease_risk: self.disease_risk * factor,
        }
    }
}

/// Net multipliers after composition. Growth and yield are relative to 1.0,
/// disease risk is an absolute probability in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetModifiers {
    pub growth: f64,
    pub yield_rate: f64,
    pub disease_risk: f64,
}

impl NetModifiers {
    pub const BASELINE: NetModifiers = NetModifiers {
        growth: 1.0,
        yield_rate: 1.0,
        disease_risk: 0.0,
    };

    #[must_use]
    pub fn growth_impact_percent(&self) -> f64 {
        (self.growth - 1.0) * 100.0
    }

    #[must_use]
    pub fn yield_impact_percent(&self) -> f64 {
        (self.yield_rate - 1.0) * 100.0
    }

    #[must_use]
    pub fn disease_risk_percent(&self) -> f64 {
        self.disease_risk * 100.0
    }
}

impl Default for NetModifiers {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// Growth and yield multiply, disease risk adds and saturates at 1.0.
///
/// Stacking is unbounded on growth and yield, so two strong boosts compound.
/// The disease sum is floored at zero since `windy` carries a negative risk.
pub fn compose<'a, I>(effects: I) -> NetModifiers
where
    I: IntoIterator<Item = &'a EffectModifiers>,
{
    let mut net = NetModifiers::BASELINE;
    let mut disease = 0.0;
    for effect in effects {
        net.growth *= 1.0 + effect.growth;
        net.yield_rate *= 1.0 + effect.yield_rate;
        disease += effect.disease_risk;
    }
    net.disease_risk = disease.clamp(0.0, 1.0);
    net
}
