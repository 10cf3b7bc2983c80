//! Breeding two owned variants and searching locations for wild genetics.
//!
//! Both operations are probabilistic. A miss is a successful call; only
//! precondition failures are errors. Each attempt commits exactly one batch
//! holding the fee, the log record and, on a hit, the new ownership.

use crate::config::BreedingConfig;
use crate::context::{next_id, GameContext};
use crate::error::{GameError, Result};
use crate::genetics::{breeding_success_rate, GeneticsRegistry};
use crate::metrics::{BREED_ATTEMPTS, BREED_SUCCESSES, DISCOVERIES, DISCOVERY_ATTEMPTS};
use crate::store::{GameStore, WriteBatch, WriteOp};
use chrono::{DateTime, Utc};
use growlab_data::{
    AcquisitionMethod, BreedingRecord, DiscoveryRecord, Effort, Ownership, Player, Rarity,
    Transaction, TransactionKind, Traits, Variant,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Discovery chance never exceeds this, whatever the player's level.
pub const MAX_DISCOVERY_RATE: f64 = 0.8;
pub const DISCOVERY_RATE_PER_LEVEL: f64 = 0.02;

/// `min(0.8, base(effort) + level * 0.02)`.
#[must_use]
pub fn discovery_rate(effort: Effort, level: u32) -> f64 {
    (effort.base_rate() + f64::from(level) * DISCOVERY_RATE_PER_LEVEL).min(MAX_DISCOVERY_RATE)
}

/// Experience for finding a variant: `50 + rarity value * 25`.
#[must_use]
pub fn discovery_experience(rarity: Rarity) -> u64 {
    50 + u64::from(rarity.value()) * 25
}

/// Picks the offspring tier. The higher parent dominates (parent1 on a tie),
/// the lower parent keeps a fixed share and there is a small chance of one
/// tier above the higher parent.
pub fn offspring_rarity<R: Rng + ?Sized>(
    rng: &mut R,
    first: Rarity,
    second: Rarity,
    cfg: &BreedingConfig,
) -> Rarity {
    let (higher, lower) = if second > first {
        (second, first)
    } else {
        (first, second)
    };
    let upgrade = higher.next();
    let upgrade_weight = if upgrade.is_some() {
        cfg.upgrade_chance
    } else {
        0.0
    };
    let lower_weight = if lower != higher {
        cfg.lower_parent_weight
    } else {
        0.0
    };

    let roll = rng.gen::<f64>();
    if roll < 1.0 - lower_weight - upgrade_weight {
        higher
    } else if roll < 1.0 - upgrade_weight {
        lower
    } else {
        upgrade.unwrap_or(higher)
    }
}

/// Builds the offspring of `a` and `b`. Stats average the parents with a
/// stability penalty, a hybrid-vigor bonus and per-trait jitter.
pub fn cross<R: Rng + ?Sized>(
    rng: &mut R,
    a: &Variant,
    b: &Variant,
    cfg: &BreedingConfig,
) -> Variant {
    let rarity = offspring_rarity(rng, a.rarity, b.rarity, cfg);
    let stability_penalty = rng.gen_range(0.0..0.1);
    let hybrid_vigor = rng.gen_range(0.05..0.25);

    let (ta, tb) = (a.traits.as_array(), b.traits.as_array());
    let mut traits = [0.0f32; 4];
    for (i, slot) in traits.iter_mut().enumerate() {
        let jitter = rng.gen_range(-0.05f32..=0.05);
        *slot = ((ta[i] + tb[i]) / 2.0 + jitter).clamp(0.0, 1.0);
    }

    Variant {
        id: next_id(rng),
        name: format!("{} x {}", a.name, b.name),
        rarity,
        stability: ((a.stability + b.stability) / 2.0 - stability_penalty).clamp(0.0, 1.0),
        vigor: ((a.vigor + b.vigor) / 2.0 + hybrid_vigor).clamp(0.0, 1.0),
        traits: Traits::from_array(traits),
        discoverable: false,
        seed_cost: (a.seed_cost + b.seed_cost) / 2,
        required_level: a.required_level.max(b.required_level),
        base_yield: (a.base_yield + b.base_yield) / 2.0 * (1.0 + hybrid_vigor),
        parents: Some((a.id, b.id)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BreedOutcome {
    Success {
        offspring: Variant,
        ownership: Ownership,
        record: BreedingRecord,
        /// Averaged parent rate, in percent.
        success_rate: f64,
    },
    Failure {
        record: BreedingRecord,
        success_rate: f64,
        reason: String,
    },
}

impl BreedOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, BreedOutcome::Success { .. })
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        match self {
            BreedOutcome::Success { success_rate, .. }
            | BreedOutcome::Failure { success_rate, .. } => *success_rate,
        }
    }

    #[must_use]
    pub fn record(&self) -> &BreedingRecord {
        match self {
            BreedOutcome::Success { record, .. } | BreedOutcome::Failure { record, .. } => record,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DiscoverOutcome {
    Found {
        variant: Variant,
        ownership: Ownership,
        experience: u64,
        rate: f64,
    },
    /// The roll hit but the player already owns every discoverable variant.
    NothingLeft { rate: f64 },
    Miss { rate: f64 },
}

impl DiscoverOutcome {
    #[must_use]
    pub fn rate(&self) -> f64 {
        match self {
            DiscoverOutcome::Found { rate, .. }
            | DiscoverOutcome::NothingLeft { rate }
            | DiscoverOutcome::Miss { rate } => *rate,
        }
    }

    #[must_use]
    pub fn found(&self) -> Option<&Variant> {
        match self {
            DiscoverOutcome::Found { variant, .. } => Some(variant),
            _ => None,
        }
    }
}

pub struct BreedingEngine {
    ctx: GameContext,
    registry: Arc<GeneticsRegistry>,
    rng: Mutex<ChaCha8Rng>,
}

impl BreedingEngine {
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

    /// Word position of the engine RNG, saved with snapshots.
    #[must_use]
    pub fn rng_position(&self) -> u128 {
        self.lock_rng().get_word_pos()
    }

    /// Rolls under the engine lock, commits after releasing it.
    pub fn breed(&self, parent1_id: Uuid, parent2_id: Uuid, player_id: Uuid) -> Result<BreedOutcome> {
        let (outcome, batch) = {
            let mut rng = self.lock_rng();
            self.roll_breed(parent1_id, parent2_id, player_id, &mut *rng)?
        };
        self.commit_breed(outcome, batch)
    }

    pub fn breed_with_rng<R: Rng + ?Sized>(
        &self,
        parent1_id: Uuid,
        parent2_id: Uuid,
        player_id: Uuid,
        rng: &mut R,
    ) -> Result<BreedOutcome> {
        let (outcome, batch) = self.roll_breed(parent1_id, parent2_id, player_id, rng)?;
        self.commit_breed(outcome, batch)
    }

    /// Checks preconditions and draws every random value of one cross.
    fn roll_breed<R: Rng + ?Sized>(
        &self,
        parent1_id: Uuid,
        parent2_id: Uuid,
        player_id: Uuid,
        rng: &mut R,
    ) -> Result<(BreedOutcome, WriteBatch)> {
        if parent1_id == parent2_id {
            tracing::debug!(player_id = %player_id, "Rejected self-breeding");
            return Err(GameError::invalid("a variant cannot be bred with itself"));
        }
        let cfg = &self.ctx.config.breeding;
        let player = self.registry.player(player_id)?;
        let parent1 = self.registry.variant(parent1_id)?;
        let parent2 = self.registry.variant(parent2_id)?;
        let own1 = self.owned(player_id, parent1_id)?;
        let own2 = self.owned(player_id, parent2_id)?;
        ensure_funds(&player, cfg.breed_cost)?;

        let success_rate =
            (breeding_success_rate(&parent1) + breeding_success_rate(&parent2)) / 2.0;
        let success = rng.gen::<f64>() < success_rate / 100.0;
        let now = self.ctx.now();

        let mut batch = WriteBatch::new();
        let record_id = next_id(rng);
        batch.push(WriteOp::Debit {
            player_id,
            amount: cfg.breed_cost,
        });
        batch.push(WriteOp::AppendTransaction(fee(
            rng,
            player_id,
            TransactionKind::BreedingFee,
            cfg.breed_cost,
            format!("Breeding {} with {}", parent1.name, parent2.name),
            record_id,
            now,
        )));

        if !success {
            let record = BreedingRecord {
                id: record_id,
                player_id,
                parent1_id,
                parent2_id,
                offspring_id: None,
                success: false,
                success_rate,
                bred_at: now,
            };
            batch.push(WriteOp::AppendBreeding(record.clone()));
            let outcome = BreedOutcome::Failure {
                record,
                success_rate,
                reason: format!("crossing did not take ({success_rate:.1}% chance)"),
            };
            return Ok((outcome, batch));
        }

        let offspring = cross(rng, &parent1, &parent2, cfg);
        let ownership = Ownership {
            player_id,
            variant_id: offspring.id,
            acquired_at: now,
            method: AcquisitionMethod::Bred,
            generation: own1.generation.max(own2.generation) + 1,
        };
        let record = BreedingRecord {
            id: record_id,
            player_id,
            parent1_id,
            parent2_id,
            offspring_id: Some(offspring.id),
            success: true,
            success_rate,
            bred_at: now,
        };
        batch.push(WriteOp::InsertVariant(offspring.clone()));
        batch.push(WriteOp::GrantOwnership(ownership.clone()));
        batch.push(WriteOp::AppendBreeding(record.clone()));
        let outcome = BreedOutcome::Success {
            offspring,
            ownership,
            record,
            success_rate,
        };
        Ok((outcome, batch))
    }

    fn commit_breed(&self, outcome: BreedOutcome, batch: WriteBatch) -> Result<BreedOutcome> {
        self.ctx.metrics.increment_counter(BREED_ATTEMPTS);
        self.ctx.store.commit(batch)?;
        match &outcome {
            BreedOutcome::Success {
                offspring,
                ownership,
                ..
            } => {
                self.ctx.metrics.increment_counter(BREED_SUCCESSES);
                tracing::info!(
                    player_id = %ownership.player_id,
                    offspring_id = %offspring.id,
                    rarity = %offspring.rarity,
                    generation = ownership.generation,
                    "Bred new variant"
                );
            }
            BreedOutcome::Failure {
                record,
                success_rate,
                ..
            } => {
                tracing::info!(player_id = %record.player_id, success_rate, "Breeding attempt failed");
            }
        }
        Ok(outcome)
    }

    pub fn discover(
        &self,
        player_id: Uuid,
        location_id: Uuid,
        effort: Effort,
    ) -> Result<DiscoverOutcome> {
        let (outcome, batch) = {
            let mut rng = self.lock_rng();
            self.roll_discovery(player_id, location_id, effort, &mut *rng)?
        };
        self.commit_discovery(player_id, outcome, batch)
    }

    pub fn discover_with_rng<R: Rng + ?Sized>(
        &self,
        player_id: Uuid,
        location_id: Uuid,
        effort: Effort,
        rng: &mut R,
    ) -> Result<DiscoverOutcome> {
        let (outcome, batch) = self.roll_discovery(player_id, location_id, effort, rng)?;
        self.commit_discovery(player_id, outcome, batch)
    }

    fn roll_discovery<R: Rng + ?Sized>(
        &self,
        player_id: Uuid,
        location_id: Uuid,
        effort: Effort,
        rng: &mut R,
    ) -> Result<(DiscoverOutcome, WriteBatch)> {
        let cost = self.ctx.config.breeding.discovery_cost;
        let player = self.registry.player(player_id)?;
        ensure_funds(&player, cost)?;

        let rate = discovery_rate(effort, player.level);
        let hit = rng.gen::<f64>() < rate;
        let now = self.ctx.now();

        let picked = if hit {
            let available = self.registry.list_available(player_id)?;
            if available.is_empty() {
                None
            } else {
                Some(available[rng.gen_range(0..available.len())].clone())
            }
        } else {
            None
        };

        let record_id = next_id(rng);
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Debit {
            player_id,
            amount: cost,
        });
        batch.push(WriteOp::AppendTransaction(fee(
            rng,
            player_id,
            TransactionKind::DiscoveryFee,
            cost,
            format!("{effort} effort search"),
            record_id,
            now,
        )));
        batch.push(WriteOp::AppendDiscovery(DiscoveryRecord {
            id: record_id,
            player_id,
            location_id,
            effort,
            rate,
            variant_id: picked.as_ref().map(|v| v.id),
            attempted_at: now,
        }));

        let outcome = match picked {
            Some(variant) => {
                let experience = discovery_experience(variant.rarity);
                let ownership = Ownership {
                    player_id,
                    variant_id: variant.id,
                    acquired_at: now,
                    method: AcquisitionMethod::WildDiscovery,
                    generation: 0,
                };
                batch.push(WriteOp::GrantOwnership(ownership.clone()));
                batch.push(WriteOp::AwardExperience {
                    player_id,
                    amount: experience,
                });
                DiscoverOutcome::Found {
                    variant,
                    ownership,
                    experience,
                    rate,
                }
            }
            None if hit => DiscoverOutcome::NothingLeft { rate },
            None => DiscoverOutcome::Miss { rate },
        };
        Ok((outcome, batch))
    }

    fn commit_discovery(
        &self,
        player_id: Uuid,
        outcome: DiscoverOutcome,
        batch: WriteBatch,
    ) -> Result<DiscoverOutcome> {
        self.ctx.metrics.increment_counter(DISCOVERY_ATTEMPTS);
        self.ctx.store.commit(batch)?;

        match &outcome {
            DiscoverOutcome::Found {
                variant, experience, ..
            } => {
                self.ctx.metrics.increment_counter(DISCOVERIES);
                tracing::info!(
                    player_id = %player_id,
                    variant_id = %variant.id,
                    rarity = %variant.rarity,
                    experience,
                    "Discovered wild variant"
                );
            }
            DiscoverOutcome::NothingLeft { .. } => {
                tracing::info!(player_id = %player_id, "Search hit but nothing left to find");
            }
            DiscoverOutcome::Miss { rate } => {
                tracing::debug!(player_id = %player_id, rate, "Search found nothing");
            }
        }
        Ok(outcome)
    }

    fn owned(&self, player_id: Uuid, variant_id: Uuid) -> Result<Ownership> {
        self.ctx
            .store
            .ownership(player_id, variant_id)?
            .ok_or(GameError::NotOwned {
                player_id,
                variant_id,
            })
    }
}

fn ensure_funds(player: &Player, required: u64) -> Result<()> {
    if player.tokens < required {
        tracing::debug!(player_id = %player.id, required, available = player.tokens, "Insufficient funds");
        return Err(GameError::InsufficientFunds {
            required,
            available: player.tokens,
        });
    }
    Ok(())
}

fn fee<R: Rng + ?Sized>(
    rng: &mut R,
    player_id: Uuid,
    kind: TransactionKind,
    amount: u64,
    description: String,
    reference_id: Uuid,
    at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: next_id(rng),
        player_id,
        kind,
        amount: -i64::try_from(amount).unwrap_or(i64::MAX),
        description,
        reference_id: Some(reference_id),
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::GameConfig;
    use crate::store::{GameState, MemoryStore};
    use growlab_data::{Plant, WeatherEvent};
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::{OnceLock, Weak};

    fn parent(rarity: Rarity) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            name: rarity.as_str().to_string(),
            rarity,
            stability: 0.5,
            vigor: 0.5,
            traits: Traits::default(),
            discoverable: true,
            seed_cost: 20,
            required_level: 2,
            base_yield: 100.0,
            parents: None,
        }
    }

    #[test]
    fn test_discovery_rate_capped() {
        assert!((discovery_rate(Effort::High, 10) - 0.55).abs() < 1e-12);
        assert!((discovery_rate(Effort::Low, 1) - 0.12).abs() < 1e-12);
        assert_eq!(discovery_rate(Effort::High, 500), MAX_DISCOVERY_RATE);
    }

    #[test]
    fn test_discovery_experience() {
        assert_eq!(discovery_experience(Rarity::Common), 75);
        assert_eq!(discovery_experience(Rarity::Legendary), 175);
    }

    #[test]
    fn test_rarity_roll_favours_higher_parent() {
        let cfg = BreedingConfig::default();
        let mut low_roll = StepRng::new(0, 0);
        assert_eq!(
            offspring_rarity(&mut low_roll, Rarity::Common, Rarity::Epic, &cfg),
            Rarity::Epic
        );
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let r = offspring_rarity(&mut rng, Rarity::Rare, Rarity::Common, &cfg);
            assert!(matches!(r, Rarity::Common | Rarity::Rare | Rarity::Epic));
        }
    }

    #[test]
    fn test_legendary_never_upgrades() {
        let cfg = BreedingConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            assert_eq!(
                offspring_rarity(&mut rng, Rarity::Legendary, Rarity::Legendary, &cfg),
                Rarity::Legendary
            );
        }
    }

    #[test]
    fn test_cross_inherits_stats() {
        let cfg = BreedingConfig::default();
        let a = parent(Rarity::Common);
        let mut b = parent(Rarity::Uncommon);
        b.seed_cost = 40;
        b.required_level = 5;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let child = cross(&mut rng, &a, &b, &cfg);
        assert!(!child.discoverable);
        assert_eq!(child.parents, Some((a.id, b.id)));
        assert_eq!(child.seed_cost, 30);
        assert_eq!(child.required_level, 5);
        assert!(child.stability <= 0.5 && child.stability > 0.4);
        assert!(child.vigor >= 0.55 && child.vigor < 0.75);
        assert!(child.base_yield >= 105.0 && child.base_yield < 125.0);
        assert!(child.traits.is_normalized());
    }

    /// Records whether the engine's RNG was free each time a batch landed.
    struct WatchedStore {
        inner: MemoryStore,
        engine: OnceLock<Weak<BreedingEngine>>,
        rng_free_at_commit: AtomicBool,
    }

    impl GameStore for WatchedStore {
        fn player(&self, id: Uuid) -> Result<Option<Player>> {
            self.inner.player(id)
        }
        fn players(&self) -> Result<Vec<Player>> {
            self.inner.players()
        }
        fn variant(&self, id: Uuid) -> Result<Option<Variant>> {
            self.inner.variant(id)
        }
        fn variants(&self) -> Result<Vec<Variant>> {
            self.inner.variants()
        }
        fn ownerships(&self, player_id: Uuid) -> Result<Vec<Ownership>> {
            self.inner.ownerships(player_id)
        }
        fn ownership(&self, player_id: Uuid, variant_id: Uuid) -> Result<Option<Ownership>> {
            self.inner.ownership(player_id, variant_id)
        }
        fn breeding_records(&self, player_id: Uuid) -> Result<Vec<BreedingRecord>> {
            self.inner.breeding_records(player_id)
        }
        fn discovery_records(&self, player_id: Uuid) -> Result<Vec<DiscoveryRecord>> {
            self.inner.discovery_records(player_id)
        }
        fn weather_events(&self) -> Result<Vec<WeatherEvent>> {
            self.inner.weather_events()
        }
        fn weather_event(&self, id: Uuid) -> Result<Option<WeatherEvent>> {
            self.inner.weather_event(id)
        }
        fn plant(&self, id: Uuid) -> Result<Option<Plant>> {
            self.inner.plant(id)
        }
        fn plants_for(&self, player_id: Uuid) -> Result<Vec<Plant>> {
            self.inner.plants_for(player_id)
        }
        fn transactions(&self, player_id: Uuid) -> Result<Vec<Transaction>> {
            self.inner.transactions(player_id)
        }
        fn commit(&self, batch: WriteBatch) -> Result<()> {
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                let free = engine.rng.try_lock().is_ok();
                self.rng_free_at_commit.store(free, AtomicOrdering::SeqCst);
            }
            self.inner.commit(batch)
        }
        fn snapshot(&self) -> Result<GameState> {
            self.inner.snapshot()
        }
    }

    #[test]
    fn test_commit_runs_outside_rng_lock() {
        let store = Arc::new(WatchedStore {
            inner: MemoryStore::new(),
            engine: OnceLock::new(),
            rng_free_at_commit: AtomicBool::new(false),
        });
        let player = Player::new(Uuid::new_v4(), "breeder", 1_000);
        let a = parent(Rarity::Common);
        let b = parent(Rarity::Common);
        let mut setup = WriteBatch::new()
            .with(WriteOp::InsertPlayer(player.clone()))
            .with(WriteOp::InsertVariant(a.clone()))
            .with(WriteOp::InsertVariant(b.clone()));
        for variant in [&a, &b] {
            setup.push(WriteOp::GrantOwnership(Ownership {
                player_id: player.id,
                variant_id: variant.id,
                acquired_at: Utc::now(),
                method: AcquisitionMethod::Granted,
                generation: 0,
            }));
        }
        store.commit(setup).unwrap();

        let ctx = GameContext::new(store.clone(), Arc::new(SystemClock), GameConfig::default());
        let registry = Arc::new(GeneticsRegistry::new(ctx.clone()));
        let engine = Arc::new(BreedingEngine::new(
            ctx,
            registry,
            ChaCha8Rng::seed_from_u64(21),
        ));
        store.engine.set(Arc::downgrade(&engine)).ok();

        engine.breed(a.id, b.id, player.id).unwrap();
        assert!(store.rng_free_at_commit.swap(false, AtomicOrdering::SeqCst));
        engine.discover(player.id, Uuid::new_v4(), Effort::Low).unwrap();
        assert!(store.rng_free_at_commit.load(AtomicOrdering::SeqCst));
    }
}
