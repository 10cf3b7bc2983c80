//! Scripted simulation on a manual clock.
//!
//! Each simulated hour runs one weather auto-cycle, then every player takes
//! a turn: harvest what is ready, treat sick plants, replant, and now and
//! then search for wild genetics or cross two strains.

use super::state::App;
use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use growlab_core::clock::{Clock, ManualClock};
use growlab_core::config::GameConfig;
use growlab_core::context::RUNNER_STREAM;
use growlab_core::lifecycle::CareAction;
use growlab_core::store::GameStore;
use growlab_core::weather::WeatherStats;
use growlab_core::GameError;
use growlab_data::{Effort, Plant, PlantState, Player};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

const TARGET_PLANTS: usize = 3;
const TREAT_EXPOSURE: f64 = 50.0;
const DISCOVERY_EVERY_HOURS: u32 = 12;
const BREED_EVERY_HOURS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub name: String,
    pub tokens: u64,
    pub level: u32,
    pub experience: u64,
    pub varieties_owned: usize,
    pub plants_alive: usize,
    pub plants_harvested: usize,
    pub plants_dead: usize,
    pub grams_harvested: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlessReport {
    pub hours: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub players: Vec<PlayerReport>,
    pub weather: WeatherStats,
    pub counters: BTreeMap<String, u64>,
}

/// Options for one headless run.
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub hours: u32,
    pub players: usize,
    pub start: DateTime<Utc>,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            hours: 24 * 14,
            players: 3,
            start: Utc
                .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Runs a world forward and returns the final report. Unseeded configs get
/// a fixed seed so runs can be compared.
pub fn run_headless(mut config: GameConfig, options: &HeadlessOptions) -> Result<HeadlessReport> {
    if config.world.seed.is_none() {
        config.world.deterministic = true;
    }
    let clock = Arc::new(ManualClock::new(options.start));
    let mut app = App::in_memory(config, clock.clone());
    let mut rng = app.ctx.rng_for(RUNNER_STREAM);

    app.seed_catalog()?;
    let mut players = Vec::with_capacity(options.players);
    for i in 0..options.players {
        players.push(app.register_player(&format!("grower-{}", i + 1))?.id);
    }
    let locations: Vec<Uuid> = (0..4).map(|_| Uuid::from_u128(rng.gen())).collect();

    app.weather.ensure_weather(clock.now())?;
    tracing::info!(hours = options.hours, players = options.players, "Headless run started");

    for hour in 1..=options.hours {
        let now = clock.advance(Duration::hours(1));
        app.weather.auto_cycle(now)?;
        for &player_id in &players {
            take_turn(&app, &mut rng, player_id, hour, &locations)?;
        }
        if hour % 24 == 0 {
            let summary = app.weather.summary(now)?;
            tracing::info!(day = hour / 24, weather = %summary.dominant, "Day complete");
        }
    }

    let report = build_report(&app, options, &players)?;
    app.ctx.metrics.log_summary();
    Ok(report)
}

/// Gameplay rejections are part of normal play; anything else aborts.
fn tolerate<T>(result: growlab_core::Result<T>) -> growlab_core::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            err @ (GameError::InsufficientFunds { .. }
            | GameError::LevelTooLow { .. }
            | GameError::NotReady { .. }
            | GameError::Conflict(_)),
        ) => {
            tracing::debug!(kind = err.kind(), error = %err, "Move rejected");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn take_turn(
    app: &App,
    rng: &mut ChaCha8Rng,
    player_id: Uuid,
    hour: u32,
    locations: &[Uuid],
) -> Result<()> {
    let plants = app.lifecycle.list_plants(player_id)?;

    for plant in plants.iter().filter(|p| p.is_ready()) {
        tolerate(app.lifecycle.harvest(plant.id, player_id))?;
    }
    for plant in plants
        .iter()
        .filter(|p| p.is_alive() && p.disease_exposure > TREAT_EXPOSURE)
    {
        tolerate(app.lifecycle.tend(plant.id, player_id, CareAction::Treat))?;
    }
    if let Some(plant) = plants.iter().find(|p| p.state == PlantState::Seedling) {
        if rng.gen_bool(0.25) {
            tolerate(app.lifecycle.tend(plant.id, player_id, CareAction::Water))?;
        }
    }

    let growing = plants
        .iter()
        .filter(|p| p.is_alive() && !p.is_ready())
        .count();
    if growing < TARGET_PLANTS {
        replant(app, rng, player_id, locations)?;
    }

    if hour % DISCOVERY_EVERY_HOURS == 0 {
        let effort = match rng.gen_range(0..3) {
            0 => Effort::Low,
            1 => Effort::Medium,
            _ => Effort::High,
        };
        let location = locations[rng.gen_range(0..locations.len())];
        tolerate(app.breeding.discover(player_id, location, effort))?;
    }

    if hour % BREED_EVERY_HOURS == 0 {
        let owned = app.genetics.list_owned(player_id)?;
        if owned.len() >= 2 {
            let first = rng.gen_range(0..owned.len());
            let mut second = rng.gen_range(0..owned.len() - 1);
            if second >= first {
                second += 1;
            }
            tolerate(app.breeding.breed(
                owned[first].variant.id,
                owned[second].variant.id,
                player_id,
            ))?;
        }
    }
    Ok(())
}

/// Plants the most valuable owned strain the player can afford and grow.
fn replant(app: &App, rng: &mut ChaCha8Rng, player_id: Uuid, locations: &[Uuid]) -> Result<()> {
    let Some(player) = app.ctx.store.player(player_id)? else {
        return Ok(());
    };
    let choice = app
        .genetics
        .list_owned(player_id)?
        .into_iter()
        .map(|o| o.variant)
        .filter(|v| v.seed_cost <= player.tokens && v.required_level <= player.level)
        .max_by(|a, b| {
            a.base_yield
                .partial_cmp(&b.base_yield)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.name.cmp(&a.name))
        });
    if let Some(variant) = choice {
        let location = locations[rng.gen_range(0..locations.len())];
        tolerate(app.lifecycle.plant(player_id, variant.id, location))?;
    }
    Ok(())
}

fn build_report(app: &App, options: &HeadlessOptions, players: &[Uuid]) -> Result<HeadlessReport> {
    let mut reports = Vec::with_capacity(players.len());
    for &player_id in players {
        let Some(player) = app.ctx.store.player(player_id)? else {
            continue;
        };
        let plants = app.lifecycle.list_plants(player_id)?;
        reports.push(player_report(
            &player,
            app.genetics.list_owned(player_id)?.len(),
            &plants,
        ));
    }
    Ok(HeadlessReport {
        hours: options.hours,
        started_at: options.start,
        finished_at: app.now(),
        players: reports,
        weather: app.weather.stats(options.hours.div_ceil(24).max(1))?,
        counters: app.ctx.metrics.snapshot(),
    })
}

fn player_report(player: &Player, varieties_owned: usize, plants: &[Plant]) -> PlayerReport {
    let count = |state: PlantState| plants.iter().filter(|p| p.state == state).count();
    PlayerReport {
        name: player.name.clone(),
        tokens: player.tokens,
        level: player.level,
        experience: player.experience,
        varieties_owned,
        plants_alive: plants.iter().filter(|p| p.is_alive()).count(),
        plants_harvested: count(PlantState::Harvested),
        plants_dead: count(PlantState::Dead),
        grams_harvested: plants.iter().filter_map(|p| p.harvest_yield).sum(),
    }
}
