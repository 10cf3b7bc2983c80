//! Gameplay counters and logging setup.
//!
//! Services bump named counters as commands resolve; the runner logs them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

pub const BREED_ATTEMPTS: &str = "breed_attempts";
pub const BREED_SUCCESSES: &str = "breed_successes";
pub const DISCOVERY_ATTEMPTS: &str = "discovery_attempts";
pub const DISCOVERIES: &str = "discoveries";
pub const PLANTINGS: &str = "plantings";
pub const HARVESTS: &str = "harvests";
pub const PLANT_DEATHS: &str = "plant_deaths";
pub const WEATHER_SPAWNED: &str = "weather_spawned";
pub const WEATHER_EXPIRED: &str = "weather_expired";
pub const COMMIT_CONFLICTS: &str = "commit_conflicts";

/// Process-wide gameplay statistics.
pub struct Metrics {
    cycle_count: AtomicU64,
    counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a completed weather auto-cycle.
    pub fn record_cycle(&self, duration: Duration, expired: usize, spawned: usize) {
        let cycles = self.cycle_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.add(WEATHER_EXPIRED, expired as u64);
        self.add(WEATHER_SPAWNED, spawned as u64);

        // Log at info level once a simulated day
        if cycles % 24 == 0 {
            tracing::info!(
                cycles,
                expired,
                spawned,
                duration_us = duration.as_micros() as u64,
                "Weather cycle"
            );
        }
    }

    pub fn increment_counter(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    /// Sorted copy of every named counter.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_summary(&self) {
        for (name, value) in self.snapshot() {
            tracing::info!(counter = %name, value, "Metric");
        }
        tracing::info!(
            cycles = self.cycle_count(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Run summary"
        );
    }
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .finish(),
    )
    .ok();
}
