//! Weather timeline: creation, expiry, periodic generation and the effect
//! views consumed by plant growth.
//!
//! Every mutation goes through one mutex, which also owns the weather RNG,
//! so an auto-cycle tick never interleaves with a manual trigger. Reads only
//! take the store's read lock.

use crate::context::{next_id, GameContext};
use crate::error::{GameError, Result};
use crate::metrics::WEATHER_SPAWNED;
use crate::modifiers::{compose, EffectModifiers, NetModifiers};
use crate::store::{GameStore, WriteBatch, WriteOp};
use chrono::{DateTime, Datelike, Duration, Utc};
use growlab_data::{DiseaseKind, EventOrigin, Severity, WeatherEvent, WeatherType};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

/// Base effect of a weather type at moderate severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectProfile {
    pub modifiers: EffectModifiers,
    /// Degrees Celsius relative to normal.
    pub temperature: f64,
    /// Percentage points relative to normal.
    pub humidity: f64,
    /// Percent relative to normal.
    pub light: f64,
}

impl EffectProfile {
    const fn new(
        growth: f64,
        yield_rate: f64,
        disease_risk: f64,
        temperature: f64,
        humidity: f64,
        light: f64,
    ) -> Self {
        Self {
            modifiers: EffectModifiers {
                growth,
                yield_rate,
                disease_risk,
            },
            temperature,
            humidity,
            light,
        }
    }

    #[must_use]
    pub fn for_type(kind: WeatherType) -> Self {
        match kind {
            WeatherType::HeatWave => Self::new(-0.30, -0.15, 0.10, 15.0, -20.0, 0.0),
            WeatherType::ColdSnap => Self::new(-0.50, -0.20, 0.05, -20.0, 0.0, 0.0),
            WeatherType::RainStorm => Self::new(0.10, 0.0, 0.15, 0.0, 30.0, -25.0),
            WeatherType::Drought => Self::new(-0.40, -0.25, 0.20, 0.0, -40.0, 0.0),
            WeatherType::Sunny => Self::new(0.15, 0.10, 0.0, 5.0, 0.0, 20.0),
            WeatherType::Overcast => Self::new(-0.10, 0.0, 0.0, -3.0, 0.0, -15.0),
            WeatherType::Windy => Self::new(-0.05, 0.0, -0.05, 0.0, -10.0, 0.0),
        }
    }

    /// The profile scaled by the severity multiplier.
    #[must_use]
    pub fn resolve(kind: WeatherType, severity: Severity) -> Self {
        let base = Self::for_type(kind);
        let factor = severity.multiplier();
        Self {
            modifiers: base.modifiers.scaled(factor),
            temperature: base.temperature * factor,
            humidity: base.humidity * factor,
            light: base.light * factor,
        }
    }
}

/// One event resolved to the modifiers it applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectView {
    pub event_id: Uuid,
    pub kind: WeatherType,
    pub severity: Severity,
    pub origin: EventOrigin,
    pub description: String,
    pub start: DateTime<Utc>,
    /// Effective end, honouring early termination.
    pub end: DateTime<Utc>,
    pub modifiers: EffectModifiers,
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    /// Empty when the event carries no disease risk.
    pub diseases: Vec<DiseaseKind>,
}

impl EffectView {
    #[must_use]
    pub fn from_event(event: &WeatherEvent) -> Self {
        let profile = EffectProfile::resolve(event.kind, event.severity);
        Self {
            event_id: event.id,
            kind: event.kind,
            severity: event.severity,
            origin: event.origin,
            description: event.description.clone(),
            start: event.start,
            end: event.effective_end(),
            modifiers: profile.modifiers,
            temperature: profile.temperature,
            humidity: profile.humidity,
            light: profile.light,
            diseases: if profile.modifiers.disease_risk > 0.0 {
                event.kind.diseases().to_vec()
            } else {
                Vec::new()
            },
        }
    }
}

/// Effects active at `at`, newest start first.
#[must_use]
pub fn effects_at(events: &[WeatherEvent], at: DateTime<Utc>) -> Vec<EffectView> {
    let mut views: Vec<EffectView> = events
        .iter()
        .filter(|e| e.is_active_at(at))
        .map(EffectView::from_event)
        .collect();
    views.sort_by(|a, b| b.start.cmp(&a.start));
    views
}

/// Net modifiers at `at`, without building full views.
#[must_use]
pub fn net_modifiers_at(events: &[WeatherEvent], at: DateTime<Utc>) -> NetModifiers {
    let active: Vec<EffectModifiers> = events
        .iter()
        .filter(|e| e.is_active_at(at))
        .map(|e| EffectProfile::resolve(e.kind, e.severity).modifiers)
        .collect();
    compose(&active)
}

/// Weather types that fit the month (northern hemisphere).
#[must_use]
pub fn seasonal_pool(month: u32) -> [WeatherType; 3] {
    match month {
        12 | 1 | 2 => [
            WeatherType::ColdSnap,
            WeatherType::Overcast,
            WeatherType::Windy,
        ],
        3..=5 => [
            WeatherType::RainStorm,
            WeatherType::Sunny,
            WeatherType::Overcast,
        ],
        6..=8 => [
            WeatherType::HeatWave,
            WeatherType::Sunny,
            WeatherType::RainStorm,
        ],
        _ => [
            WeatherType::Overcast,
            WeatherType::Windy,
            WeatherType::ColdSnap,
        ],
    }
}

const EXTREME_TYPES: [WeatherType; 3] = [
    WeatherType::HeatWave,
    WeatherType::ColdSnap,
    WeatherType::Drought,
];

const RANDOM_SEVERITIES: [Severity; 3] = [Severity::Mild, Severity::Moderate, Severity::Severe];

#[must_use]
pub fn default_description(kind: WeatherType, severity: Severity) -> String {
    format!("A {severity} {kind} weather event")
}

/// A validated request to create or schedule an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub kind: WeatherType,
    pub severity: Severity,
    pub duration_hours: u32,
    pub description: Option<String>,
}

impl EventRequest {
    #[must_use]
    pub fn new(kind: WeatherType, severity: Severity, duration_hours: u32) -> Self {
        Self {
            kind,
            severity,
            duration_hours,
            description: None,
        }
    }

    /// Parses the string forms used by external callers.
    pub fn parse(
        kind: &str,
        severity: &str,
        duration_hours: u32,
        description: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            kind: kind.parse()?,
            severity: severity.parse()?,
            duration_hours,
            description: description.map(str::to_string),
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn description(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => default_description(self.kind, self.severity),
        }
    }
}

/// Ids touched by one auto-cycle tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub expired: Vec<Uuid>,
    pub spawned: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub kind: WeatherType,
    pub count: usize,
    /// Fraction of all events in the window.
    pub share: f64,
    pub avg_duration_hours: f64,
    pub avg_growth: f64,
    pub avg_yield: f64,
    pub avg_disease_risk: f64,
    pub by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStats {
    pub days: u32,
    pub total: usize,
    /// Most frequent type first.
    pub by_type: Vec<TypeStats>,
}

/// Current conditions as shown to players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub at: DateTime<Utc>,
    pub effects: Vec<EffectView>,
    pub net: NetModifiers,
    pub dominant: String,
    pub growth_impact_percent: f64,
    pub yield_impact_percent: f64,
    pub disease_risk_percent: f64,
    pub temperature_delta: f64,
    pub humidity_delta: f64,
    pub light_delta: f64,
    /// Every disease the active weather threatens, sorted and deduplicated.
    pub disease_threats: Vec<DiseaseKind>,
}

#[must_use]
pub fn disease_threats(effects: &[EffectView]) -> Vec<DiseaseKind> {
    effects
        .iter()
        .flat_map(|e| e.diseases.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `"heat_wave (severe), windy (mild)"`, or `"Clear conditions"`.
#[must_use]
pub fn dominant_weather(effects: &[EffectView]) -> String {
    if effects.is_empty() {
        return "Clear conditions".to_string();
    }
    effects
        .iter()
        .map(|e| format!("{} ({})", e.kind, e.severity))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct WeatherEngine {
    ctx: GameContext,
    timeline: Mutex<ChaCha8Rng>,
}

impl WeatherEngine {
    #[must_use]
    pub fn new(ctx: GameContext, rng: ChaCha8Rng) -> Self {
        Self {
            ctx,
            timeline: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    fn lock(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.timeline.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn rng_position(&self) -> u128 {
        self.lock().get_word_pos()
    }

    fn validate_duration(&self, hours: u32) -> Result<()> {
        let max = self.ctx.config.weather.max_duration_hours;
        if hours == 0 || hours > max {
            return Err(GameError::invalid(format!(
                "duration must be between 1 and {max} hours, got {hours}"
            )));
        }
        Ok(())
    }

    /// Starts an event now.
    pub fn create_event(&self, request: EventRequest) -> Result<Uuid> {
        self.validate_duration(request.duration_hours)?;
        let mut rng = self.lock();
        let now = self.ctx.now();
        self.insert(&mut *rng, &request, now, EventOrigin::Manual)
    }

    /// Books an event that starts later. Scheduled events are what the
    /// forecast reports.
    pub fn schedule_event(&self, request: EventRequest, starts_at: DateTime<Utc>) -> Result<Uuid> {
        self.validate_duration(request.duration_hours)?;
        let mut rng = self.lock();
        let now = self.ctx.now();
        if starts_at <= now {
            return Err(GameError::invalid(format!(
                "scheduled start {starts_at} is not in the future"
            )));
        }
        self.insert(&mut *rng, &request, starts_at, EventOrigin::Manual)
    }

    /// Ends an event now. Ending an already ended event is a no-op.
    pub fn end_event(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock();
        let event = self
            .ctx
            .store
            .weather_event(id)?
            .ok_or_else(|| GameError::not_found(format!("weather event {id}")))?;
        if event.is_ended() {
            tracing::debug!(event_id = %id, "Weather event already ended");
            return Ok(());
        }
        let now = self.ctx.now();
        self.ctx
            .store
            .commit(WriteBatch::new().with(WriteOp::EndWeatherEvent { id, at: now }))?;
        tracing::info!(event_id = %id, kind = %event.kind, "Weather event ended");
        Ok(())
    }

    pub fn active_effects(&self, now: DateTime<Utc>) -> Result<Vec<EffectView>> {
        Ok(effects_at(&self.ctx.store.weather_events()?, now))
    }

    pub fn net_modifiers(&self, now: DateTime<Utc>) -> Result<NetModifiers> {
        Ok(net_modifiers_at(&self.ctx.store.weather_events()?, now))
    }

    /// One scheduler tick using the engine's own RNG.
    pub fn auto_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut rng = self.lock();
        self.cycle_locked(&mut *rng, now)
    }

    pub fn auto_cycle_with_rng<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<CycleReport> {
        let _guard = self.lock();
        self.cycle_locked(rng, now)
    }

    fn cycle_locked<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Result<CycleReport> {
        let started = Instant::now();
        let cfg = &self.ctx.config.weather;
        let events = self.ctx.store.weather_events()?;
        let mut batch = WriteBatch::new();
        let mut report = CycleReport::default();

        for event in events.iter().filter(|e| !e.is_ended() && e.has_elapsed(now)) {
            batch.push(WriteOp::EndWeatherEvent {
                id: event.id,
                at: event.end,
            });
            report.expired.push(event.id);
        }

        let mut active: BTreeSet<WeatherType> = events
            .iter()
            .filter(|e| e.is_active_at(now))
            .map(|e| e.kind)
            .collect();

        if rng.gen::<f64>() < cfg.seasonal_chance {
            let pool = seasonal_pool(now.month());
            if let Some(&kind) = pool.choose(rng) {
                if !active.contains(&kind) {
                    let event = seasonal_event(rng, kind, now);
                    active.insert(kind);
                    report.spawned.push(event.id);
                    batch.push(WriteOp::InsertWeatherEvent(event));
                }
            }
        }

        if rng.gen::<f64>() < cfg.extreme_chance {
            if let Some(&kind) = EXTREME_TYPES.choose(rng) {
                if !active.contains(&kind) {
                    let hours = rng.gen_range(1..=6);
                    let event = build_event(
                        rng,
                        kind,
                        Severity::Severe,
                        now,
                        hours,
                        default_description(kind, Severity::Severe),
                        EventOrigin::Extreme,
                    );
                    report.spawned.push(event.id);
                    batch.push(WriteOp::InsertWeatherEvent(event));
                }
            }
        }

        let logged: Vec<WeatherEvent> = batch
            .ops()
            .iter()
            .filter_map(|op| match op {
                WriteOp::InsertWeatherEvent(e) => Some(e.clone()),
                _ => None,
            })
            .collect();
        self.ctx.store.commit(batch)?;

        for id in &report.expired {
            tracing::info!(event_id = %id, "Weather event expired");
        }
        for event in &logged {
            log_spawn(event);
        }
        self.ctx.metrics.record_cycle(
            started.elapsed(),
            report.expired.len(),
            report.spawned.len(),
        );
        Ok(report)
    }

    /// Spawns a seasonal event if nothing is active. Run once when the
    /// scheduler starts.
    pub fn ensure_weather(&self, now: DateTime<Utc>) -> Result<Option<Uuid>> {
        let mut rng = self.lock();
        self.ensure_locked(&mut *rng, now)
    }

    pub fn ensure_weather_with_rng<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Option<Uuid>> {
        let _guard = self.lock();
        self.ensure_locked(rng, now)
    }

    fn ensure_locked<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Result<Option<Uuid>> {
        let events = self.ctx.store.weather_events()?;
        if events.iter().any(|e| e.is_active_at(now)) {
            return Ok(None);
        }
        let pool = seasonal_pool(now.month());
        let kind = pool[rng.gen_range(0..pool.len())];
        let event = seasonal_event(rng, kind, now);
        Ok(Some(self.commit_spawn(event)?))
    }

    /// Spawns an event of any type, mild to severe, lasting 2 to 24 hours.
    pub fn spawn_random(&self, now: DateTime<Utc>) -> Result<Uuid> {
        let mut rng = self.lock();
        spawn_random_event(&mut *rng, now).and_then(|e| self.commit_spawn(e))
    }

    pub fn spawn_random_with_rng<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Uuid> {
        let _guard = self.lock();
        spawn_random_event(rng, now).and_then(|e| self.commit_spawn(e))
    }

    /// Scheduled events starting within the forecast window, soonest first.
    pub fn forecast(&self, now: DateTime<Utc>) -> Result<Vec<EffectView>> {
        let horizon = now + Duration::hours(i64::from(self.ctx.config.weather.forecast_hours));
        let mut upcoming: Vec<WeatherEvent> = self
            .ctx
            .store
            .weather_events()?
            .into_iter()
            .filter(|e| !e.is_ended() && e.start > now && e.start <= horizon)
            .collect();
        upcoming.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(upcoming.iter().map(EffectView::from_event).collect())
    }

    /// Per-type aggregates over events that started in the last `days` days.
    pub fn stats(&self, days: u32) -> Result<WeatherStats> {
        if days == 0 {
            return Err(GameError::invalid("stats window must be at least one day"));
        }
        let now = self.ctx.now();
        let since = now - Duration::days(i64::from(days));
        let events: Vec<WeatherEvent> = self
            .ctx
            .store
            .weather_events()?
            .into_iter()
            .filter(|e| e.start >= since && e.start <= now)
            .collect();
        let total = events.len();

        let mut grouped: BTreeMap<WeatherType, Vec<&WeatherEvent>> = BTreeMap::new();
        for event in &events {
            grouped.entry(event.kind).or_default().push(event);
        }

        let mut by_type: Vec<TypeStats> = grouped
            .into_iter()
            .map(|(kind, group)| {
                let n = group.len() as f64;
                let mut by_severity = BTreeMap::new();
                let (mut hours, mut growth, mut yield_rate, mut disease) = (0.0, 0.0, 0.0, 0.0);
                for event in &group {
                    *by_severity.entry(event.severity).or_insert(0) += 1;
                    let m = EffectProfile::resolve(event.kind, event.severity).modifiers;
                    hours += event.duration_hours();
                    growth += m.growth;
                    yield_rate += m.yield_rate;
                    disease += m.disease_risk;
                }
                TypeStats {
                    kind,
                    count: group.len(),
                    share: n / total as f64,
                    avg_duration_hours: hours / n,
                    avg_growth: growth / n,
                    avg_yield: yield_rate / n,
                    avg_disease_risk: disease / n,
                    by_severity,
                }
            })
            .collect();
        by_type.sort_by(|a, b| b.count.cmp(&a.count).then(a.kind.cmp(&b.kind)));

        Ok(WeatherStats {
            days,
            total,
            by_type,
        })
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Result<WeatherSummary> {
        let effects = self.active_effects(now)?;
        let net = compose(effects.iter().map(|e| &e.modifiers));
        Ok(WeatherSummary {
            at: now,
            dominant: dominant_weather(&effects),
            growth_impact_percent: net.growth_impact_percent(),
            yield_impact_percent: net.yield_impact_percent(),
            disease_risk_percent: net.disease_risk_percent(),
            temperature_delta: effects.iter().map(|e| e.temperature).sum(),
            humidity_delta: effects.iter().map(|e| e.humidity).sum(),
            light_delta: effects.iter().map(|e| e.light).sum(),
            disease_threats: disease_threats(&effects),
            net,
            effects,
        })
    }

    fn insert<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        request: &EventRequest,
        start: DateTime<Utc>,
        origin: EventOrigin,
    ) -> Result<Uuid> {
        let event = build_event(
            rng,
            request.kind,
            request.severity,
            start,
            request.duration_hours,
            request.description(),
            origin,
        );
        self.commit_spawn(event)
    }

    fn commit_spawn(&self, event: WeatherEvent) -> Result<Uuid> {
        let id = event.id;
        let logged = event.clone();
        self.ctx
            .store
            .commit(WriteBatch::new().with(WriteOp::InsertWeatherEvent(event)))?;
        log_spawn(&logged);
        self.ctx.metrics.increment_counter(WEATHER_SPAWNED);
        Ok(id)
    }
}

fn build_event<R: Rng + ?Sized>(
    rng: &mut R,
    kind: WeatherType,
    severity: Severity,
    start: DateTime<Utc>,
    hours: u32,
    description: String,
    origin: EventOrigin,
) -> WeatherEvent {
    WeatherEvent {
        id: next_id(rng),
        kind,
        severity,
        start,
        end: start + Duration::hours(i64::from(hours)),
        description,
        origin,
        ended_at: None,
    }
}

fn seasonal_event<R: Rng + ?Sized>(rng: &mut R, kind: WeatherType, now: DateTime<Utc>) -> WeatherEvent {
    let severity = if rng.gen::<f64>() < 0.7 {
        Severity::Mild
    } else {
        Severity::Moderate
    };
    let hours = rng.gen_range(4..=16);
    build_event(
        rng,
        kind,
        severity,
        now,
        hours,
        default_description(kind, severity),
        EventOrigin::Seasonal,
    )
}

fn spawn_random_event<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Result<WeatherEvent> {
    let kind = *WeatherType::ALL
        .choose(rng)
        .ok_or_else(|| GameError::invalid("no weather types"))?;
    let severity = *RANDOM_SEVERITIES
        .choose(rng)
        .ok_or_else(|| GameError::invalid("no severities"))?;
    let hours = rng.gen_range(2..=24);
    Ok(build_event(
        rng,
        kind,
        severity,
        now,
        hours,
        default_description(kind, severity),
        EventOrigin::Random,
    ))
}

fn log_spawn(event: &WeatherEvent) {
    tracing::info!(
        event_id = %event.id,
        kind = %event.kind,
        severity = %event.severity,
        origin = ?event.origin,
        hours = event.duration_hours(),
        "Weather event spawned"
    );
}
