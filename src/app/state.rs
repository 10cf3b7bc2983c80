use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use growlab_core::breeding::BreedingEngine;
use growlab_core::catalog::starter_variants;
use growlab_core::clock::Clock;
use growlab_core::config::GameConfig;
use growlab_core::context::{
    next_id, GameContext, RngPositions, BREEDING_STREAM, CATALOG_STREAM, LIFECYCLE_STREAM,
    WEATHER_STREAM,
};
use growlab_core::genetics::GeneticsRegistry;
use growlab_core::lifecycle::PlantLifecycle;
use growlab_core::store::{GameStore, MemoryStore, WriteBatch, WriteOp};
use growlab_core::weather::WeatherEngine;
use growlab_data::{Player, Rarity};
use growlab_io::snapshot::{self, Snapshot};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Every game service wired to one store, clock and config.
pub struct App {
    pub ctx: GameContext,
    pub weather: Arc<WeatherEngine>,
    pub genetics: Arc<GeneticsRegistry>,
    pub breeding: BreedingEngine,
    pub lifecycle: PlantLifecycle,
    rng: ChaCha8Rng,
    snapshot_path: Option<PathBuf>,
}

impl App {
    pub fn new(config: GameConfig, store: Arc<dyn GameStore>, clock: Arc<dyn Clock>) -> Self {
        Self::resume(config, store, clock, &RngPositions::new())
    }

    /// Like [`App::new`], with every service stream moved to `positions`.
    pub fn resume(
        config: GameConfig,
        store: Arc<dyn GameStore>,
        clock: Arc<dyn Clock>,
        positions: &RngPositions,
    ) -> Self {
        let ctx = GameContext::new(store, clock, config);
        let weather = Arc::new(WeatherEngine::new(
            ctx.clone(),
            ctx.rng_resumed(WEATHER_STREAM, positions),
        ));
        let genetics = Arc::new(GeneticsRegistry::new(ctx.clone()));
        let breeding = BreedingEngine::new(
            ctx.clone(),
            genetics.clone(),
            ctx.rng_resumed(BREEDING_STREAM, positions),
        );
        let lifecycle = PlantLifecycle::new(
            ctx.clone(),
            genetics.clone(),
            ctx.rng_resumed(LIFECYCLE_STREAM, positions),
        );
        let rng = ctx.rng_resumed(CATALOG_STREAM, positions);
        tracing::info!(fingerprint = %ctx.config.fingerprint(), "Game services ready");
        Self {
            ctx,
            weather,
            genetics,
            breeding,
            lifecycle,
            rng,
            snapshot_path: None,
        }
    }

    pub fn in_memory(config: GameConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), clock)
    }

    /// Restores a saved world. A config fingerprint mismatch is logged, not
    /// rejected.
    pub fn from_snapshot<P: AsRef<Path>>(
        config: GameConfig,
        clock: Arc<dyn Clock>,
        path: P,
    ) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = snapshot::load(path).context("restoring world")?;
        if snapshot.config_fingerprint != config.fingerprint() {
            tracing::warn!(
                saved = %snapshot.config_fingerprint,
                current = %config.fingerprint(),
                "Snapshot was produced under different rules"
            );
        }
        let store = Arc::new(MemoryStore::from_state(snapshot.state));
        Ok(Self::resume(config, store, clock, &snapshot.rng_positions).with_snapshot_path(path))
    }

    #[must_use]
    pub fn with_snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.now()
    }

    pub fn config(&self) -> &GameConfig {
        &self.ctx.config
    }

    /// Registers the starter strains when the catalog is empty.
    pub fn seed_catalog(&mut self) -> Result<Vec<Uuid>> {
        if !self.ctx.store.variants()?.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for variant in starter_variants(&mut self.rng) {
            ids.push(self.genetics.register_variant(variant)?);
        }
        tracing::info!(count = ids.len(), "Seeded starter catalog");
        Ok(ids)
    }

    /// Opens an account with the configured starting tokens and grants the
    /// common starter strains.
    pub fn register_player(&mut self, name: &str) -> Result<Player> {
        let player = Player::new(
            next_id(&mut self.rng),
            name,
            self.ctx.config.world.starting_tokens,
        );
        self.ctx
            .store
            .commit(WriteBatch::new().with(WriteOp::InsertPlayer(player.clone())))?;

        let mut starters: Vec<_> = self
            .ctx
            .store
            .variants()?
            .into_iter()
            .filter(|v| v.rarity == Rarity::Common && !v.is_bred())
            .collect();
        starters.sort_by(|a, b| a.name.cmp(&b.name));
        for variant in starters {
            self.genetics.grant(player.id, variant.id)?;
        }
        tracing::info!(player_id = %player.id, name, "Player registered");
        Ok(player)
    }

    /// Where each service stream stands now.
    pub fn rng_positions(&self) -> RngPositions {
        RngPositions::from([
            (WEATHER_STREAM, self.weather.rng_position()),
            (BREEDING_STREAM, self.breeding.rng_position()),
            (LIFECYCLE_STREAM, self.lifecycle.rng_position()),
            (CATALOG_STREAM, self.rng.get_word_pos()),
        ])
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::new(
            self.now(),
            self.ctx.config.fingerprint(),
            self.ctx.store.snapshot()?,
        )
        .with_rng_positions(self.rng_positions()))
    }

    /// Writes a snapshot when a path is configured.
    pub fn save_state(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => {
                snapshot::save(&self.snapshot()?, path)
                    .with_context(|| format!("saving snapshot to {}", path.display()))?;
            }
            None => tracing::debug!("No snapshot path configured, skipping save"),
        }
        Ok(())
    }
}
