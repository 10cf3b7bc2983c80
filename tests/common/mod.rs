pub mod macros;

use chrono::{DateTime, Duration, TimeZone, Utc};
use growlab_core::clock::ManualClock;
use growlab_core::config::GameConfig;
use growlab_core::store::{GameStore, WriteBatch, WriteOp};
use growlab_data::{AcquisitionMethod, Ownership, Player, Rarity, Traits, Variant};
use growlab_lib::app::App;
use std::sync::Arc;
use uuid::Uuid;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

#[allow(dead_code)]
pub struct TestGame {
    pub app: App,
    pub clock: Arc<ManualClock>,
    pub players: Vec<Uuid>,
    pub variants: Vec<Uuid>,
}

#[allow(dead_code)]
impl TestGame {
    pub fn player(&self, index: usize) -> Player {
        self.app
            .ctx
            .store
            .player(self.players[index])
            .unwrap()
            .expect("player missing from store")
    }

    pub fn tokens(&self, index: usize) -> u64 {
        self.player(index).tokens
    }

    pub fn advance_hours(&self, hours: i64) -> DateTime<Utc> {
        self.clock.advance(Duration::hours(hours))
    }

    pub fn grant(&self, player: usize, variant: usize) {
        self.app
            .genetics
            .grant(self.players[player], self.variants[variant])
            .unwrap();
    }
}

struct PlayerSetup {
    name: String,
    tokens: u64,
    level: u32,
}

#[allow(dead_code)]
pub struct GameBuilder {
    config: GameConfig,
    start: DateTime<Utc>,
    players: Vec<PlayerSetup>,
    variants: Vec<Variant>,
    ownerships: Vec<(usize, usize)>,
    starter_catalog: bool,
}

#[allow(dead_code)]
impl GameBuilder {
    pub fn new() -> Self {
        let mut config = GameConfig::default();
        config.world.seed = Some(42);
        Self {
            config,
            start: t0(),
            players: Vec::new(),
            variants: Vec::new(),
            ownerships: Vec::new(),
            starter_catalog: false,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.world.seed = Some(seed);
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut GameConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Seeds the starter catalog before any builder variants are added.
    pub fn with_starter_catalog(mut self) -> Self {
        self.starter_catalog = true;
        self
    }

    pub fn with_player(mut self, name: &str, tokens: u64) -> Self {
        self.players.push(PlayerSetup {
            name: name.to_string(),
            tokens,
            level: 1,
        });
        self
    }

    pub fn with_player_at_level(mut self, name: &str, tokens: u64, level: u32) -> Self {
        self.players.push(PlayerSetup {
            name: name.to_string(),
            tokens,
            level,
        });
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Grants builder variant `variant` to builder player `player`.
    pub fn owning(mut self, player: usize, variant: usize) -> Self {
        self.ownerships.push((player, variant));
        self
    }

    pub fn build(self) -> TestGame {
        let clock = Arc::new(ManualClock::new(self.start));
        let mut app = App::in_memory(self.config, clock.clone());
        if self.starter_catalog {
            app.seed_catalog().unwrap();
        }

        let mut batch = WriteBatch::new();
        let mut players = Vec::new();
        for (i, setup) in self.players.iter().enumerate() {
            let id = Uuid::from_u128(0x1000 + i as u128);
            let mut player = Player::new(id, &setup.name, setup.tokens);
            player.level = setup.level;
            player.experience = u64::from(setup.level.saturating_sub(1)) * 1000;
            players.push(player.id);
            batch.push(WriteOp::InsertPlayer(player));
        }
        let variants: Vec<Uuid> = self.variants.iter().map(|v| v.id).collect();
        for variant in self.variants {
            batch.push(WriteOp::InsertVariant(variant));
        }
        for (player, variant) in self.ownerships {
            batch.push(WriteOp::GrantOwnership(Ownership {
                player_id: players[player],
                variant_id: variants[variant],
                acquired_at: self.start,
                method: AcquisitionMethod::Granted,
                generation: 0,
            }));
        }
        if !batch.is_empty() {
            app.ctx.store.commit(batch).unwrap();
        }

        TestGame {
            app,
            clock,
            players,
            variants,
        }
    }
}

#[allow(dead_code)]
pub struct VariantBuilder {
    id: Uuid,
    name: String,
    rarity: Rarity,
    stability: f64,
    vigor: f64,
    discoverable: bool,
    seed_cost: u64,
    required_level: u32,
    base_yield: f64,
}

#[allow(dead_code)]
impl VariantBuilder {
    /// A neutral common strain. `n` keeps ids distinct across a test.
    pub fn new(n: u128, name: &str) -> Self {
        Self {
            id: Uuid::from_u128(0x2000 + n),
            name: name.to_string(),
            rarity: Rarity::Common,
            stability: 0.5,
            vigor: 0.5,
            discoverable: true,
            seed_cost: 10,
            required_level: 1,
            base_yield: 100.0,
        }
    }

    pub fn rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn stats(mut self, stability: f64, vigor: f64) -> Self {
        self.stability = stability;
        self.vigor = vigor;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.discoverable = false;
        self
    }

    pub fn seed_cost(mut self, cost: u64) -> Self {
        self.seed_cost = cost;
        self
    }

    pub fn required_level(mut self, level: u32) -> Self {
        self.required_level = level;
        self
    }

    pub fn base_yield(mut self, grams: f64) -> Self {
        self.base_yield = grams;
        self
    }

    pub fn build(self) -> Variant {
        Variant {
            id: self.id,
            name: self.name,
            rarity: self.rarity,
            stability: self.stability,
            vigor: self.vigor,
            traits: Traits::default(),
            discoverable: self.discoverable,
            seed_cost: self.seed_cost,
            required_level: self.required_level,
            base_yield: self.base_yield,
            parents: None,
        }
    }
}
