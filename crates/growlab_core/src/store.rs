//! Persistence seam for the game services.
//!
//! Reads return owned copies taken under a read lock. Every gameplay command
//! resolves to a single [`WriteBatch`] that the store applies all-or-nothing.

use crate::error::{GameError, Result};
use chrono::{DateTime, Utc};
use growlab_data::{
    BreedingRecord, DiscoveryRecord, Ownership, Plant, Player, Transaction, Variant, WeatherEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Adds a player account. Conflicts with an existing id.
    InsertPlayer(Player),
    /// Adds a catalog entry. Conflicts with an existing id.
    InsertVariant(Variant),
    /// Replaces an existing catalog entry.
    UpdateVariant(Variant),
    /// Records a (player, variant) claim. Conflicts if already owned.
    GrantOwnership(Ownership),
    AppendBreeding(BreedingRecord),
    AppendDiscovery(DiscoveryRecord),
    /// Removes tokens; fails with `InsufficientFunds` instead of going negative.
    Debit { player_id: Uuid, amount: u64 },
    AwardExperience { player_id: Uuid, amount: u64 },
    InsertPlant(Plant),
    /// Stores `plant` if the stored revision still equals `expected_revision`.
    UpdatePlant { plant: Plant, expected_revision: u64 },
    AppendTransaction(Transaction),
    InsertWeatherEvent(WeatherEvent),
    /// Sets `ended_at` unless the event has already ended.
    EndWeatherEvent { id: Uuid, at: DateTime<Utc> },
}

/// Ordered writes committed as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    #[must_use]
    pub fn with(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<T: IntoIterator<Item = WriteOp>>(iter: T) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Everything the game engine persists. Serializable so the whole world can
/// be snapshotted and restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub players: BTreeMap<Uuid, Player>,
    pub variants: BTreeMap<Uuid, Variant>,
    /// Keyed by player id.
    pub ownerships: BTreeMap<Uuid, Vec<Ownership>>,
    pub breeding_records: Vec<BreedingRecord>,
    pub discovery_records: Vec<DiscoveryRecord>,
    /// Insertion order.
    pub weather_events: Vec<WeatherEvent>,
    pub plants: BTreeMap<Uuid, Plant>,
    pub transactions: Vec<Transaction>,
}

impl GameState {
    fn owns(&self, player_id: Uuid, variant_id: Uuid) -> bool {
        self.ownerships
            .get(&player_id)
            .is_some_and(|list| list.iter().any(|o| o.variant_id == variant_id))
    }

    fn player_mut(&mut self, id: Uuid) -> Result<&mut Player> {
        self.players
            .get_mut(&id)
            .ok_or_else(|| GameError::not_found(format!("player {id}")))
    }

    /// Applies one write and returns what undoes it. A failing write leaves
    /// the state untouched.
    fn apply(&mut self, op: WriteOp) -> Result<Undo> {
        match op {
            WriteOp::InsertPlayer(player) => {
                if self.players.contains_key(&player.id) {
                    return Err(GameError::conflict(format!("player {} exists", player.id)));
                }
                let id = player.id;
                self.players.insert(id, player);
                Ok(Undo::RemovePlayer(id))
            }
            WriteOp::InsertVariant(variant) => {
                if self.variants.contains_key(&variant.id) {
                    return Err(GameError::conflict(format!(
                        "variant {} exists",
                        variant.id
                    )));
                }
                let id = variant.id;
                self.variants.insert(id, variant);
                Ok(Undo::RemoveVariant(id))
            }
            WriteOp::UpdateVariant(variant) => {
                let slot = self
                    .variants
                    .get_mut(&variant.id)
                    .ok_or_else(|| GameError::not_found(format!("variant {}", variant.id)))?;
                let previous = std::mem::replace(slot, variant);
                Ok(Undo::RestoreVariant(previous))
            }
            WriteOp::GrantOwnership(ownership) => {
                if !self.players.contains_key(&ownership.player_id) {
                    return Err(GameError::not_found(format!(
                        "player {}",
                        ownership.player_id
                    )));
                }
                if !self.variants.contains_key(&ownership.variant_id) {
                    return Err(GameError::not_found(format!(
                        "variant {}",
                        ownership.variant_id
                    )));
                }
                if self.owns(ownership.player_id, ownership.variant_id) {
                    return Err(GameError::conflict(format!(
                        "player {} already owns variant {}",
                        ownership.player_id, ownership.variant_id
                    )));
                }
                let player_id = ownership.player_id;
                self.ownerships.entry(player_id).or_default().push(ownership);
                Ok(Undo::PopOwnership(player_id))
            }
            WriteOp::AppendBreeding(record) => {
                self.breeding_records.push(record);
                Ok(Undo::PopBreeding)
            }
            WriteOp::AppendDiscovery(record) => {
                self.discovery_records.push(record);
                Ok(Undo::PopDiscovery)
            }
            WriteOp::Debit { player_id, amount } => {
                let player = self.player_mut(player_id)?;
                if player.tokens < amount {
                    return Err(GameError::InsufficientFunds {
                        required: amount,
                        available: player.tokens,
                    });
                }
                let previous = player.clone();
                player.tokens -= amount;
                Ok(Undo::RestorePlayer(previous))
            }
            WriteOp::AwardExperience { player_id, amount } => {
                let player = self.player_mut(player_id)?;
                let previous = player.clone();
                player.gain_experience(amount);
                Ok(Undo::RestorePlayer(previous))
            }
            WriteOp::InsertPlant(plant) => {
                if self.plants.contains_key(&plant.id) {
                    return Err(GameError::conflict(format!("plant {} exists", plant.id)));
                }
                let id = plant.id;
                self.plants.insert(id, plant);
                Ok(Undo::RemovePlant(id))
            }
            WriteOp::UpdatePlant {
                mut plant,
                expected_revision,
            } => {
                let slot = self
                    .plants
                    .get_mut(&plant.id)
                    .ok_or_else(|| GameError::not_found(format!("plant {}", plant.id)))?;
                if slot.revision != expected_revision {
                    return Err(GameError::conflict(format!(
                        "plant {} changed (revision {} != {})",
                        plant.id, slot.revision, expected_revision
                    )));
                }
                plant.revision = expected_revision + 1;
                let previous = std::mem::replace(slot, plant);
                Ok(Undo::RestorePlant(previous))
            }
            WriteOp::AppendTransaction(tx) => {
                self.transactions.push(tx);
                Ok(Undo::PopTransaction)
            }
            WriteOp::InsertWeatherEvent(event) => {
                if self.weather_events.iter().any(|e| e.id == event.id) {
                    return Err(GameError::conflict(format!(
                        "weather event {} exists",
                        event.id
                    )));
                }
                self.weather_events.push(event);
                Ok(Undo::PopWeatherEvent)
            }
            WriteOp::EndWeatherEvent { id, at } => {
                let event = self
                    .weather_events
                    .iter_mut()
                    .find(|e| e.id == id)
                    .ok_or_else(|| GameError::not_found(format!("weather event {id}")))?;
                if event.ended_at.is_some() {
                    return Ok(Undo::Nothing);
                }
                let previous = event.clone();
                event.ended_at = Some(at);
                Ok(Undo::RestoreWeatherEvent(previous))
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Nothing => {}
            Undo::RemovePlayer(id) => {
                self.players.remove(&id);
            }
            Undo::RestorePlayer(player) => {
                self.players.insert(player.id, player);
            }
            Undo::RemoveVariant(id) => {
                self.variants.remove(&id);
            }
            Undo::RestoreVariant(variant) => {
                self.variants.insert(variant.id, variant);
            }
            Undo::PopOwnership(player_id) => {
                if let Some(list) = self.ownerships.get_mut(&player_id) {
                    list.pop();
                    if list.is_empty() {
                        self.ownerships.remove(&player_id);
                    }
                }
            }
            Undo::PopBreeding => {
                self.breeding_records.pop();
            }
            Undo::PopDiscovery => {
                self.discovery_records.pop();
            }
            Undo::RemovePlant(id) => {
                self.plants.remove(&id);
            }
            Undo::RestorePlant(plant) => {
                self.plants.insert(plant.id, plant);
            }
            Undo::PopTransaction => {
                self.transactions.pop();
            }
            Undo::PopWeatherEvent => {
                self.weather_events.pop();
            }
            Undo::RestoreWeatherEvent(event) => {
                if let Some(slot) = self.weather_events.iter_mut().find(|e| e.id == event.id) {
                    *slot = event;
                }
            }
        }
    }

    /// Applies every op or none of them.
    pub fn apply_batch(&mut self, batch: WriteBatch) -> Result<()> {
        let mut undo_log = Vec::with_capacity(batch.len());
        for op in batch.ops {
            match self.apply(op) {
                Ok(undo) => undo_log.push(undo),
                Err(err) => {
                    for undo in undo_log.into_iter().rev() {
                        self.revert(undo);
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

enum Undo {
    Nothing,
    RemovePlayer(Uuid),
    RestorePlayer(Player),
    RemoveVariant(Uuid),
    RestoreVariant(Variant),
    PopOwnership(Uuid),
    PopBreeding,
    PopDiscovery,
    RemovePlant(Uuid),
    RestorePlant(Plant),
    PopTransaction,
    PopWeatherEvent,
    RestoreWeatherEvent(WeatherEvent),
}

/// Storage consumed by the game services.
pub trait GameStore: Send + Sync {
    fn player(&self, id: Uuid) -> Result<Option<Player>>;
    fn players(&self) -> Result<Vec<Player>>;
    fn variant(&self, id: Uuid) -> Result<Option<Variant>>;
    fn variants(&self) -> Result<Vec<Variant>>;
    fn ownerships(&self, player_id: Uuid) -> Result<Vec<Ownership>>;
    fn ownership(&self, player_id: Uuid, variant_id: Uuid) -> Result<Option<Ownership>>;
    fn breeding_records(&self, player_id: Uuid) -> Result<Vec<BreedingRecord>>;
    fn discovery_records(&self, player_id: Uuid) -> Result<Vec<DiscoveryRecord>>;
    fn weather_events(&self) -> Result<Vec<WeatherEvent>>;
    fn weather_event(&self, id: Uuid) -> Result<Option<WeatherEvent>>;
    fn plant(&self, id: Uuid) -> Result<Option<Plant>>;
    fn plants_for(&self, player_id: Uuid) -> Result<Vec<Plant>>;
    fn transactions(&self, player_id: Uuid) -> Result<Vec<Transaction>>;
    /// Applies the whole batch or nothing.
    fn commit(&self, batch: WriteBatch) -> Result<()>;
    /// A consistent copy of everything stored.
    fn snapshot(&self) -> Result<GameState>;
}

/// Process-local store behind a single reader-writer lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<GameState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_state(state: GameState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, GameState>> {
        self.state
            .read()
            .map_err(|_| GameError::storage("state lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GameState>> {
        self.state
            .write()
            .map_err(|_| GameError::storage("state lock poisoned"))
    }
}

impl GameStore for MemoryStore {
    fn player(&self, id: Uuid) -> Result<Option<Player>> {
        Ok(self.read()?.players.get(&id).cloned())
    }

    fn players(&self) -> Result<Vec<Player>> {
        Ok(self.read()?.players.values().cloned().collect())
    }

    fn variant(&self, id: Uuid) -> Result<Option<Variant>> {
        Ok(self.read()?.variants.get(&id).cloned())
    }

    fn variants(&self) -> Result<Vec<Variant>> {
        Ok(self.read()?.variants.values().cloned().collect())
    }

    fn ownerships(&self, player_id: Uuid) -> Result<Vec<Ownership>> {
        Ok(self
            .read()?
            .ownerships
            .get(&player_id)
            .cloned()
            .unwrap_or_default())
    }

    fn ownership(&self, player_id: Uuid, variant_id: Uuid) -> Result<Option<Ownership>> {
        Ok(self.read()?.ownerships.get(&player_id).and_then(|list| {
            list.iter()
                .find(|o| o.variant_id == variant_id)
                .cloned()
        }))
    }

    fn breeding_records(&self, player_id: Uuid) -> Result<Vec<BreedingRecord>> {
        Ok(self
            .read()?
            .breeding_records
            .iter()
            .filter(|r| r.player_id == player_id)
            .cloned()
            .collect())
    }

    fn discovery_records(&self, player_id: Uuid) -> Result<Vec<DiscoveryRecord>> {
        Ok(self
            .read()?
            .discovery_records
            .iter()
            .filter(|r| r.player_id == player_id)
            .cloned()
            .collect())
    }

    fn weather_events(&self) -> Result<Vec<WeatherEvent>> {
        Ok(self.read()?.weather_events.clone())
    }

    fn weather_event(&self, id: Uuid) -> Result<Option<WeatherEvent>> {
        Ok(self
            .read()?
            .weather_events
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    fn plant(&self, id: Uuid) -> Result<Option<Plant>> {
        Ok(self.read()?.plants.get(&id).cloned())
    }

    fn plants_for(&self, player_id: Uuid) -> Result<Vec<Plant>> {
        Ok(self
            .read()?
            .plants
            .values()
            .filter(|p| p.player_id == player_id)
            .cloned()
            .collect())
    }

    fn transactions(&self, player_id: Uuid) -> Result<Vec<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .filter(|t| t.player_id == player_id)
            .cloned()
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write()?.apply_batch(batch)
    }

    fn snapshot(&self) -> Result<GameState> {
        Ok(self.read()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use growlab_data::{AcquisitionMethod, Rarity, Traits};

    fn variant() -> Variant {
        Variant {
            id: Uuid::new_v4(),
            name: "Test Strain".to_string(),
            rarity: Rarity::Common,
            stability: 0.5,
            vigor: 0.5,
            traits: Traits::default(),
            discoverable: true,
            seed_cost: 10,
            required_level: 1,
            base_yield: 100.0,
            parents: None,
        }
    }

    fn seeded() -> (MemoryStore, Player, Variant) {
        let store = MemoryStore::new();
        let player = Player::new(Uuid::new_v4(), "grower", 100);
        let v = variant();
        store
            .commit(
                WriteBatch::new()
                    .with(WriteOp::InsertPlayer(player.clone()))
                    .with(WriteOp::InsertVariant(v.clone())),
            )
            .unwrap();
        (store, player, v)
    }

    fn ownership(player_id: Uuid, variant_id: Uuid) -> Ownership {
        Ownership {
            player_id,
            variant_id,
            acquired_at: Utc::now(),
            method: AcquisitionMethod::Granted,
            generation: 0,
        }
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let (store, player, v) = seeded();
        let batch = WriteBatch::new()
            .with(WriteOp::Debit {
                player_id: player.id,
                amount: 60,
            })
            .with(WriteOp::GrantOwnership(ownership(player.id, v.id)))
            .with(WriteOp::Debit {
                player_id: player.id,
                amount: 60,
            });
        let err = store.commit(batch).unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { required: 60, available: 40 }));
        assert_eq!(store.player(player.id).unwrap().unwrap().tokens, 100);
        assert!(store.ownership(player.id, v.id).unwrap().is_none());
    }

    #[test]
    fn test_double_grant_conflicts() {
        let (store, player, v) = seeded();
        let grant = WriteBatch::new().with(WriteOp::GrantOwnership(ownership(player.id, v.id)));
        store.commit(grant.clone()).unwrap();
        let err = store.commit(grant).unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert_eq!(store.ownerships(player.id).unwrap().len(), 1);
    }

    #[test]
    fn test_plant_revision_checked() {
        let (store, player, v) = seeded();
        let now = Utc::now();
        let plant = Plant {
            id: Uuid::new_v4(),
            player_id: player.id,
            variant_id: v.id,
            location_id: Uuid::new_v4(),
            state: growlab_data::PlantState::Seedling,
            planted_at: now,
            last_updated: now,
            growth_progress: 0.0,
            disease_exposure: 0.0,
            harvested_at: None,
            died_at: None,
            harvest_yield: None,
            revision: 0,
        };
        store
            .commit(WriteBatch::new().with(WriteOp::InsertPlant(plant.clone())))
            .unwrap();

        let mut grown = plant.clone();
        grown.growth_progress = 10.0;
        store
            .commit(WriteBatch::new().with(WriteOp::UpdatePlant {
                plant: grown.clone(),
                expected_revision: 0,
            }))
            .unwrap();
        assert_eq!(store.plant(plant.id).unwrap().unwrap().revision, 1);

        let stale = store
            .commit(WriteBatch::new().with(WriteOp::UpdatePlant {
                plant: grown,
                expected_revision: 0,
            }))
            .unwrap_err();
        assert_eq!(stale.kind(), "conflict");
    }

    #[test]
    fn test_end_weather_is_idempotent() {
        let store = MemoryStore::new();
        let start = Utc::now();
        let event = WeatherEvent {
            id: Uuid::new_v4(),
            kind: growlab_data::WeatherType::Windy,
            severity: growlab_data::Severity::Mild,
            start,
            end: start + chrono::Duration::hours(2),
            description: String::new(),
            origin: growlab_data::EventOrigin::Manual,
            ended_at: None,
        };
        let id = event.id;
        store
            .commit(WriteBatch::new().with(WriteOp::InsertWeatherEvent(event)))
            .unwrap();
        let first = start + chrono::Duration::minutes(10);
        store
            .commit(WriteBatch::new().with(WriteOp::EndWeatherEvent { id, at: first }))
            .unwrap();
        store
            .commit(WriteBatch::new().with(WriteOp::EndWeatherEvent {
                id,
                at: first + chrono::Duration::minutes(5),
            }))
            .unwrap();
        assert_eq!(store.weather_event(id).unwrap().unwrap().ended_at, Some(first));
    }
}
