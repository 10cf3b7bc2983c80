//! Plant state machine.
//!
//! Plants are advanced lazily: any read, care action or harvest first steps
//! the plant from `last_updated` to now in `tick_minutes` chunks, sampling
//! the weather active at the start of each chunk.

use crate::clock::hours_between;
use crate::config::LifecycleConfig;
use crate::context::{next_id, GameContext};
use crate::error::{GameError, Result};
use crate::genetics::GeneticsRegistry;
use crate::metrics::{COMMIT_CONFLICTS, HARVESTS, PLANTINGS, PLANT_DEATHS};
use crate::modifiers::NetModifiers;
use crate::store::{GameStore, WriteBatch, WriteOp};
use crate::weather::{effects_at, net_modifiers_at, EffectView};
use chrono::{DateTime, Duration, Utc};
use growlab_data::{
    ParseEnumError, Plant, PlantState, Player, Transaction, TransactionKind, WeatherEvent,
};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const MAX_REFRESH_ATTEMPTS: usize = 3;

/// Growth points per hour in `state`.
#[must_use]
pub fn stage_rate(state: PlantState, cfg: &LifecycleConfig) -> f64 {
    match state {
        PlantState::Seedling => cfg.seedling_rate,
        PlantState::Growing => cfg.growing_rate,
        PlantState::Flowering => cfg.flowering_rate,
        PlantState::Ready | PlantState::Harvested | PlantState::Dead => 0.0,
    }
}

/// Progress at which a plant enters `state` by growing.
#[must_use]
pub fn stage_threshold(state: PlantState, cfg: &LifecycleConfig) -> Option<f64> {
    match state {
        PlantState::Seedling => Some(0.0),
        PlantState::Growing => Some(cfg.growing_threshold),
        PlantState::Flowering => Some(cfg.flowering_threshold),
        PlantState::Ready => Some(cfg.ready_threshold),
        PlantState::Harvested | PlantState::Dead => None,
    }
}

/// Moves the plant one stage forward if its progress allows.
fn try_advance_stage(plant: &mut Plant, cfg: &LifecycleConfig) -> bool {
    let Some(next) = plant.state.next() else {
        return false;
    };
    match stage_threshold(next, cfg) {
        Some(threshold) if plant.growth_progress >= threshold => plant.transition_to(next),
        _ => false,
    }
}

/// What happened while stepping a plant forward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvanceSummary {
    pub steps: u32,
    pub stages_advanced: u32,
    pub died: bool,
}

/// Steps `plant` from `last_updated` to `now`. Pure apart from `plant`.
pub fn advance_plant(
    plant: &mut Plant,
    events: &[WeatherEvent],
    now: DateTime<Utc>,
    cfg: &LifecycleConfig,
) -> AdvanceSummary {
    let mut summary = AdvanceSummary::default();
    if !plant.is_alive() || now <= plant.last_updated {
        return summary;
    }

    // A zero tick would never reach `now`.
    let tick = Duration::minutes(i64::from(cfg.tick_minutes.max(1)));
    let mut t = plant.last_updated;
    while t < now {
        let step_end = (t + tick).min(now);
        let hours = hours_between(t, step_end);
        let net = net_modifiers_at(events, t);

        plant.growth_progress += stage_rate(plant.state, cfg) * hours * net.growth;
        plant.disease_exposure += cfg.base_disease_accrual * hours * net.disease_risk;
        t = step_end;
        summary.steps += 1;

        if plant.disease_exposure > cfg.death_threshold && plant.transition_to(PlantState::Dead) {
            plant.died_at = Some(t);
            summary.died = true;
            break;
        }
        if try_advance_stage(plant, cfg) {
            summary.stages_advanced += 1;
        }
    }
    plant.last_updated = t;
    summary
}

/// Hours until ready at baseline growth. `None` once harvested or dead.
#[must_use]
pub fn time_remaining(plant: &Plant, cfg: &LifecycleConfig) -> Option<f64> {
    if plant.state.is_terminal() {
        return None;
    }
    let mut hours = 0.0;
    let mut state = plant.state;
    while state != PlantState::Ready {
        let next = state.next()?;
        let from = stage_threshold(state, cfg)?.max(plant.growth_progress);
        let to = stage_threshold(next, cfg)?;
        hours += (to - from).max(0.0) / stage_rate(state, cfg);
        state = next;
    }
    Some(hours)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
    Water,
    Treat,
}

impl CareAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CareAction::Water => "water",
            CareAction::Treat => "treat",
        }
    }
}

impl fmt::Display for CareAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CareAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "water" => Ok(CareAction::Water),
            "treat" => Ok(CareAction::Treat),
            other => Err(ParseEnumError::new("care action", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestOutcome {
    pub plant: Plant,
    pub yield_grams: f64,
    pub yield_modifier: f64,
    pub experience: u64,
}

/// How the current weather bears on one plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherImpact {
    pub plant_id: Uuid,
    pub state: PlantState,
    pub net: NetModifiers,
    pub effects: Vec<EffectView>,
    /// Grams if the plant were harvested under these conditions.
    pub projected_yield: f64,
}

pub struct PlantLifecycle {
    ctx: GameContext,
    registry: Arc<GeneticsRegistry>,
    rng: Mutex<ChaCha8Rng>,
}

impl PlantLifecycle {
    #[must_use]
    pub fn new(ctx: GameContext, registry: Arc<GeneticsRegistry>, rng: ChaCha8Rng) -> Self {
        Self {
            ctx,
            registry,
            rng: Mutex::new(rng),
        }
    }

    fn lock_rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn rng_position(&self) -> u128 {
        self.lock_rng().get_word_pos()
    }

    fn cfg(&self) -> &LifecycleConfig {
        &self.ctx.config.lifecycle
    }

    /// Buys a seed of `variant_id` and puts it in the ground.
    pub fn plant(&self, player_id: Uuid, variant_id: Uuid, location_id: Uuid) -> Result<Plant> {
        let player = self.registry.player(player_id)?;
        let variant = self.registry.variant(variant_id)?;
        ensure_funds(&player, variant.seed_cost)?;
        if player.level < variant.required_level {
            tracing::debug!(player_id = %player_id, variant_id = %variant_id, "Level too low to plant");
            return Err(GameError::LevelTooLow {
                required: variant.required_level,
                actual: player.level,
            });
        }

        let now = self.ctx.now();
        let (plant, tx) = {
            let mut rng = self.lock_rng();
            let plant = Plant {
                id: next_id(&mut *rng),
                player_id,
                variant_id,
                location_id,
                state: PlantState::Seedling,
                planted_at: now,
                last_updated: now,
                growth_progress: 0.0,
                disease_exposure: 0.0,
                harvested_at: None,
                died_at: None,
                harvest_yield: None,
                revision: 0,
            };
            let tx = Transaction {
                id: next_id(&mut *rng),
                player_id,
                kind: TransactionKind::SeedPurchase,
                amount: -signed(variant.seed_cost),
                description: format!("Seeds: {}", variant.name),
                reference_id: Some(plant.id),
                at: now,
            };
            (plant, tx)
        };

        self.ctx.store.commit(
            WriteBatch::new()
                .with(WriteOp::Debit {
                    player_id,
                    amount: variant.seed_cost,
                })
                .with(WriteOp::InsertPlant(plant.clone()))
                .with(WriteOp::AppendTransaction(tx)),
        )?;
        self.ctx.metrics.increment_counter(PLANTINGS);
        tracing::info!(plant_id = %plant.id, player_id = %player_id, variant = %variant.name, "Planted");
        Ok(plant)
    }

    /// The plant advanced to now. Only its owner may look.
    pub fn plant_view(&self, plant_id: Uuid, player_id: Uuid) -> Result<Plant> {
        let plant = self.load(plant_id)?;
        ensure_owner(&plant, player_id)?;
        self.refresh(plant_id)
    }

    /// Every plant the player owns, advanced to now, oldest first.
    pub fn list_plants(&self, player_id: Uuid) -> Result<Vec<Plant>> {
        self.registry.player(player_id)?;
        let mut plants = Vec::new();
        for plant in self.ctx.store.plants_for(player_id)? {
            plants.push(self.refresh(plant.id)?);
        }
        plants.sort_by(|a, b| a.planted_at.cmp(&b.planted_at).then(a.id.cmp(&b.id)));
        Ok(plants)
    }

    #[must_use]
    pub fn time_remaining(&self, plant: &Plant) -> Option<f64> {
        time_remaining(plant, self.cfg())
    }

    pub fn weather_impact(&self, plant_id: Uuid, player_id: Uuid) -> Result<WeatherImpact> {
        let plant = self.plant_view(plant_id, player_id)?;
        let variant = self.registry.variant(plant.variant_id)?;
        let now = self.ctx.now();
        let events = self.ctx.store.weather_events()?;
        let net = net_modifiers_at(&events, now);
        Ok(WeatherImpact {
            plant_id,
            state: plant.state,
            net,
            effects: effects_at(&events, now),
            projected_yield: variant.base_yield * net.yield_rate,
        })
    }

    pub fn harvest(&self, plant_id: Uuid, player_id: Uuid) -> Result<HarvestOutcome> {
        let stored = self.load(plant_id)?;
        ensure_owner(&stored, player_id)?;

        let now = self.ctx.now();
        let events = self.ctx.store.weather_events()?;
        let mut plant = stored.clone();
        let summary = advance_plant(&mut plant, &events, now, self.cfg());

        if !plant.transition_to(PlantState::Harvested) {
            if summary.steps > 0 {
                self.persist(&stored, plant.clone(), summary)?;
            }
            tracing::debug!(plant_id = %plant_id, state = %plant.state, "Harvest rejected");
            return Err(GameError::NotReady { state: plant.state });
        }

        let variant = self.registry.variant(plant.variant_id)?;
        let yield_modifier = net_modifiers_at(&events, now).yield_rate;
        let yield_grams = variant.base_yield * yield_modifier;
        let experience = self.cfg().harvest_experience * u64::from(variant.rarity.value());

        plant.harvested_at = Some(now);
        plant.harvest_yield = Some(yield_grams);

        let batch = WriteBatch::new()
            .with(WriteOp::UpdatePlant {
                plant: plant.clone(),
                expected_revision: stored.revision,
            })
            .with(WriteOp::AwardExperience {
                player_id,
                amount: experience,
            });
        self.commit_plant_batch(batch)?;
        plant.revision = stored.revision + 1;

        self.ctx.metrics.increment_counter(HARVESTS);
        tracing::info!(
            plant_id = %plant_id,
            yield_grams,
            yield_modifier,
            experience,
            "Harvested"
        );
        Ok(HarvestOutcome {
            plant,
            yield_grams,
            yield_modifier,
            experience,
        })
    }

    pub fn tend(&self, plant_id: Uuid, player_id: Uuid, action: CareAction) -> Result<Plant> {
        let stored = self.load(plant_id)?;
        ensure_owner(&stored, player_id)?;

        let now = self.ctx.now();
        let events = self.ctx.store.weather_events()?;
        let mut plant = stored.clone();
        let summary = advance_plant(&mut plant, &events, now, self.cfg());
        if summary.died {
            self.persist(&stored, plant.clone(), summary)?;
        }
        if plant.state.is_terminal() {
            tracing::debug!(plant_id = %plant_id, state = %plant.state, action = %action, "Care rejected");
            return Err(GameError::NotReady { state: plant.state });
        }

        let cfg = self.cfg();
        let mut batch = WriteBatch::new();
        match action {
            CareAction::Water => {
                plant.growth_progress += cfg.water_growth_bonus;
                try_advance_stage(&mut plant, cfg);
            }
            CareAction::Treat => {
                let player = self.registry.player(player_id)?;
                ensure_funds(&player, cfg.treatment_cost)?;
                plant.disease_exposure *= 1.0 - cfg.treatment_reduction;
                let tx = Transaction {
                    id: next_id(&mut *self.lock_rng()),
                    player_id,
                    kind: TransactionKind::Treatment,
                    amount: -signed(cfg.treatment_cost),
                    description: "Disease treatment".to_string(),
                    reference_id: Some(plant_id),
                    at: now,
                };
                batch.push(WriteOp::Debit {
                    player_id,
                    amount: cfg.treatment_cost,
                });
                batch.push(WriteOp::AppendTransaction(tx));
            }
        }
        batch.push(WriteOp::UpdatePlant {
            plant: plant.clone(),
            expected_revision: stored.revision,
        });
        self.commit_plant_batch(batch)?;
        plant.revision = stored.revision + 1;
        tracing::debug!(plant_id = %plant_id, action = %action, state = %plant.state, "Tended plant");
        Ok(plant)
    }

    fn load(&self, plant_id: Uuid) -> Result<Plant> {
        self.ctx
            .store
            .plant(plant_id)?
            .ok_or_else(|| GameError::not_found(format!("plant {plant_id}")))
    }

    /// Advances and stores a plant, retrying when another writer got there
    /// first.
    fn refresh(&self, plant_id: Uuid) -> Result<Plant> {
        for _ in 0..MAX_REFRESH_ATTEMPTS {
            let stored = self.load(plant_id)?;
            let mut plant = stored.clone();
            let events = self.ctx.store.weather_events()?;
            let summary = advance_plant(&mut plant, &events, self.ctx.now(), self.cfg());
            if summary.steps == 0 {
                return Ok(stored);
            }
            match self.persist(&stored, plant, summary) {
                Err(GameError::Conflict(_)) => continue,
                other => return other,
            }
        }
        Err(GameError::conflict(format!(
            "plant {plant_id} kept changing during refresh"
        )))
    }

    fn persist(&self, stored: &Plant, mut plant: Plant, summary: AdvanceSummary) -> Result<Plant> {
        self.commit_plant_batch(WriteBatch::new().with(WriteOp::UpdatePlant {
            plant: plant.clone(),
            expected_revision: stored.revision,
        }))?;
        plant.revision = stored.revision + 1;
        if summary.died {
            self.ctx.metrics.increment_counter(PLANT_DEATHS);
            tracing::info!(
                plant_id = %plant.id,
                exposure = plant.disease_exposure,
                "Plant died of disease"
            );
        }
        Ok(plant)
    }

    fn commit_plant_batch(&self, batch: WriteBatch) -> Result<()> {
        self.ctx.store.commit(batch).map_err(|err| {
            if matches!(err, GameError::Conflict(_)) {
                self.ctx.metrics.increment_counter(COMMIT_CONFLICTS);
                tracing::warn!(error = %err, "Plant write conflict");
            }
            err
        })
    }
}

fn ensure_owner(plant: &Plant, player_id: Uuid) -> Result<()> {
    if plant.player_id != player_id {
        tracing::debug!(plant_id = %plant.id, player_id = %player_id, "Plant access denied");
        return Err(GameError::forbidden(format!(
            "plant {} belongs to another player",
            plant.id
        )));
    }
    Ok(())
}

fn ensure_funds(player: &Player, required: u64) -> Result<()> {
    if player.tokens < required {
        return Err(GameError::InsufficientFunds {
            required,
            available: player.tokens,
        });
    }
    Ok(())
}

fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
