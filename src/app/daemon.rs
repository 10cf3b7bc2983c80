//! Long-running world on the wall clock.

use super::shutdown::ShutdownManager;
use super::state::App;
use anyhow::Result;
use growlab_core::clock::{Clock, SystemClock};
use growlab_core::config::GameConfig;
use growlab_core::scheduler::spawn_auto_cycle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Daemon settings resolved from the command line.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub snapshot_path: PathBuf,
    /// Overrides `weather.cycle_interval_secs`.
    pub cycle_interval: Option<Duration>,
    pub save_on_exit: bool,
}

/// Restores the snapshot at `path` if present, otherwise starts a fresh
/// world with the starter catalog.
pub fn open_world(config: GameConfig, clock: Arc<dyn Clock>, path: &Path) -> Result<App> {
    if path.exists() {
        tracing::info!(path = %path.display(), "Restoring world from snapshot");
        return App::from_snapshot(config, clock, path);
    }
    tracing::info!(path = %path.display(), "No snapshot found, starting a new world");
    let mut app = App::in_memory(config, clock).with_snapshot_path(path);
    app.seed_catalog()?;
    Ok(app)
}

/// Runs weather auto-cycles until `shutdown` fires, then saves the world.
pub async fn run_daemon_until(
    app: App,
    options: &DaemonOptions,
    shutdown: &ShutdownManager,
) -> Result<u64> {
    let period = options
        .cycle_interval
        .unwrap_or_else(|| Duration::from_secs(app.config().weather.cycle_interval_secs));
    tracing::info!(period_secs = period.as_secs_f64(), "Daemon started");

    let handle = spawn_auto_cycle(app.weather.clone(), period);
    shutdown.wait().await;
    let ticks = handle.stop().await;
    tracing::info!(ticks, "Weather scheduler stopped");

    shutdown.cleanup(&app)?;
    app.ctx.metrics.log_summary();
    Ok(ticks)
}

/// Entry point for `growlab daemon`.
pub async fn run_daemon(config: GameConfig, options: DaemonOptions) -> Result<u64> {
    let app = open_world(config, Arc::new(SystemClock), &options.snapshot_path)?;
    let mut shutdown = ShutdownManager::new();
    shutdown.set_save_on_exit(options.save_on_exit);
    run_daemon_until(app, &options, &shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use growlab_core::store::GameStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_daemon_saves_and_restores() {
        let path = std::env::temp_dir().join(format!("growlab-daemon-{}.gz", Uuid::new_v4()));
        let options = DaemonOptions {
            snapshot_path: path.clone(),
            cycle_interval: Some(Duration::from_millis(5)),
            save_on_exit: true,
        };
        let app = open_world(GameConfig::default(), Arc::new(SystemClock), &path).unwrap();
        let variants = app.ctx.store.variants().unwrap().len();
        assert!(variants > 0);

        let shutdown = Arc::new(ShutdownManager::new());
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            trigger.request_shutdown();
        });
        run_daemon_until(app, &options, &shutdown).await.unwrap();
        assert!(path.exists());

        let restored = open_world(GameConfig::default(), Arc::new(SystemClock), &path).unwrap();
        assert_eq!(restored.ctx.store.variants().unwrap().len(), variants);
        assert!(!restored.ctx.store.weather_events().unwrap().is_empty());
        std::fs::remove_file(&path).ok();
    }
}
