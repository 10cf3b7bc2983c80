//! Background weather auto-cycle.
//!
//! One tokio task calls [`WeatherEngine::auto_cycle`] on a fixed interval.
//! Stopping is checked between ticks only; a tick itself runs to completion
//! under the engine's mutation lock.

use crate::weather::WeatherEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Owns the running auto-cycle task.
pub struct AutoCycleHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl AutoCycleHandle {
    /// Signals the task and waits for it to finish. Returns the number of
    /// ticks it ran.
    pub async fn stop(self) -> u64 {
        self.stop_tx.send(true).ok();
        match self.task.await {
            Ok(ticks) => ticks,
            Err(err) => {
                tracing::warn!(error = %err, "Auto-cycle task did not exit cleanly");
                0
            }
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Bootstraps weather once, then ticks every `period` until stopped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_auto_cycle(engine: Arc<WeatherEngine>, period: Duration) -> AutoCycleHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let clock = engine.context().clock.clone();
        match engine.ensure_weather(clock.now()) {
            Ok(Some(id)) => tracing::info!(event_id = %id, "Bootstrapped weather"),
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "Weather bootstrap failed"),
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.auto_cycle(clock.now()) {
                        Ok(report) => {
                            ticks += 1;
                            tracing::debug!(
                                expired = report.expired.len(),
                                spawned = report.spawned.len(),
                                "Auto-cycle tick"
                            );
                        }
                        Err(err) => tracing::warn!(error = %err, "Auto-cycle tick failed"),
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(ticks, "Auto-cycle stopped");
        ticks
    });

    AutoCycleHandle { stop_tx, task }
}
