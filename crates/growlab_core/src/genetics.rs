//! Genetics catalog and per-player ownership queries.

use crate::context::GameContext;
use crate::error::{GameError, Result};
use crate::store::{GameStore, WriteBatch, WriteOp};
use growlab_data::{
    AcquisitionMethod, BreedingRecord, Ownership, Player, Rarity, RarityInfo, Variant,
    RARITY_CATALOG,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const MIN_SUCCESS_RATE: f64 = 10.0;
pub const MAX_SUCCESS_RATE: f64 = 90.0;

/// Breeding success percentage for one parent:
/// `base(rarity) + stability * 20 + vigor * 10`, clamped to `[10, 90]`.
#[must_use]
pub fn breeding_success_rate(variant: &Variant) -> f64 {
    let rate =
        variant.rarity.base_success_rate() + variant.stability * 20.0 + variant.vigor * 10.0;
    rate.clamp(MIN_SUCCESS_RATE, MAX_SUCCESS_RATE)
}

#[must_use]
pub fn rarity_catalog() -> &'static [RarityInfo] {
    &RARITY_CATALOG
}

/// Rarest first, then by name.
fn catalog_order(a: &Variant, b: &Variant) -> Ordering {
    b.rarity.cmp(&a.rarity).then_with(|| a.name.cmp(&b.name))
}

/// Checks the fields an administrator may set.
pub fn validate_variant(variant: &Variant) -> Result<()> {
    let unit = 0.0..=1.0;
    if variant.name.trim().is_empty() {
        return Err(GameError::invalid("variant name must not be empty"));
    }
    if !unit.contains(&variant.stability) {
        return Err(GameError::invalid(format!(
            "stability {} outside [0, 1]",
            variant.stability
        )));
    }
    if !unit.contains(&variant.vigor) {
        return Err(GameError::invalid(format!(
            "vigor {} outside [0, 1]",
            variant.vigor
        )));
    }
    if !variant.traits.is_normalized() {
        return Err(GameError::invalid("trait scores must lie in [0, 1]"));
    }
    if !(variant.base_yield.is_finite() && variant.base_yield > 0.0) {
        return Err(GameError::invalid("base yield must be positive"));
    }
    Ok(())
}

/// A variant a player owns, with its breeding rate precomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedVariant {
    pub variant: Variant,
    pub ownership: Ownership,
    pub breeding_success_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total: usize,
    pub bred: usize,
    pub natural: usize,
    pub by_rarity: BTreeMap<Rarity, usize>,
}

pub struct GeneticsRegistry {
    ctx: GameContext,
}

impl GeneticsRegistry {
    #[must_use]
    pub fn new(ctx: GameContext) -> Self {
        Self { ctx }
    }

    pub(crate) fn player(&self, player_id: Uuid) -> Result<Player> {
        self.ctx
            .store
            .player(player_id)?
            .ok_or_else(|| GameError::not_found(format!("player {player_id}")))
    }

    pub fn variant(&self, variant_id: Uuid) -> Result<Variant> {
        self.ctx
            .store
            .variant(variant_id)?
            .ok_or_else(|| GameError::not_found(format!("variant {variant_id}")))
    }

    /// Owned variants, rarest first then by name.
    pub fn list_owned(&self, player_id: Uuid) -> Result<Vec<OwnedVariant>> {
        self.player(player_id)?;
        let mut owned = Vec::new();
        for ownership in self.ctx.store.ownerships(player_id)? {
            let variant = self.variant(ownership.variant_id)?;
            owned.push(OwnedVariant {
                breeding_success_rate: breeding_success_rate(&variant),
                variant,
                ownership,
            });
        }
        owned.sort_by(|a, b| catalog_order(&a.variant, &b.variant));
        Ok(owned)
    }

    /// Discoverable variants the player does not own yet.
    pub fn list_available(&self, player_id: Uuid) -> Result<Vec<Variant>> {
        self.player(player_id)?;
        let owned: Vec<Uuid> = self
            .ctx
            .store
            .ownerships(player_id)?
            .into_iter()
            .map(|o| o.variant_id)
            .collect();
        let mut available: Vec<Variant> = self
            .ctx
            .store
            .variants()?
            .into_iter()
            .filter(|v| v.discoverable && !owned.contains(&v.id))
            .collect();
        available.sort_by(catalog_order);
        Ok(available)
    }

    pub fn collection(&self, player_id: Uuid) -> Result<CollectionSummary> {
        let owned = self.list_owned(player_id)?;
        let mut summary = CollectionSummary {
            total: owned.len(),
            ..Default::default()
        };
        for entry in &owned {
            if entry.ownership.method == AcquisitionMethod::Bred {
                summary.bred += 1;
            } else {
                summary.natural += 1;
            }
            *summary.by_rarity.entry(entry.variant.rarity).or_insert(0) += 1;
        }
        Ok(summary)
    }

    /// Most recent breeding attempts, newest first.
    pub fn breeding_history(&self, player_id: Uuid) -> Result<Vec<BreedingRecord>> {
        let mut records = self.ctx.store.breeding_records(player_id)?;
        records.sort_by(|a, b| b.bred_at.cmp(&a.bred_at));
        records.truncate(self.ctx.config.breeding.history_limit);
        Ok(records)
    }

    pub fn register_variant(&self, variant: Variant) -> Result<Uuid> {
        validate_variant(&variant)?;
        let id = variant.id;
        let name = variant.name.clone();
        self.ctx
            .store
            .commit(WriteBatch::new().with(WriteOp::InsertVariant(variant)))?;
        tracing::info!(variant_id = %id, name = %name, "Variant registered");
        Ok(id)
    }

    pub fn update_variant(&self, variant: Variant) -> Result<()> {
        validate_variant(&variant)?;
        let id = variant.id;
        self.ctx
            .store
            .commit(WriteBatch::new().with(WriteOp::UpdateVariant(variant)))?;
        tracing::info!(variant_id = %id, "Variant updated");
        Ok(())
    }

    /// Administrative grant of a natural variant.
    pub fn grant(&self, player_id: Uuid, variant_id: Uuid) -> Result<Ownership> {
        self.player(player_id)?;
        self.variant(variant_id)?;
        if self.ctx.store.ownership(player_id, variant_id)?.is_some() {
            return Err(GameError::conflict(format!(
                "player {player_id} already owns variant {variant_id}"
            )));
        }
        let ownership = Ownership {
            player_id,
            variant_id,
            acquired_at: self.ctx.now(),
            method: AcquisitionMethod::Granted,
            generation: 0,
        };
        self.ctx
            .store
            .commit(WriteBatch::new().with(WriteOp::GrantOwnership(ownership.clone())))?;
        tracing::debug!(player_id = %player_id, variant_id = %variant_id, "Variant granted");
        Ok(ownership)
    }
}
