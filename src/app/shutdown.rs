//! Graceful shutdown for the daemon.
//!
//! Ctrl-C flips a shared flag; the daemon stops the weather scheduler and
//! writes a final snapshot before exiting.

use super::state::App;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Tracks shutdown requests and what to do on the way out.
pub struct ShutdownManager {
    shutdown_requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
    save_on_exit: bool,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            save_on_exit: true,
        }
    }

    pub fn set_save_on_exit(&mut self, save: bool) {
        self.save_on_exit = save;
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        tracing::info!("Shutdown requested");
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn should_save_on_exit(&self) -> bool {
        self.save_on_exit
    }

    /// Resolves once shutdown has been requested, by Ctrl-C or by
    /// [`request_shutdown`](Self::request_shutdown).
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        tokio::select! {
            _ = &mut notified => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    notified.await;
                    return;
                }
                tracing::info!("Ctrl-C received, initiating graceful shutdown...");
                self.shutdown_requested.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Saves the world when configured to.
    pub fn cleanup(&self, app: &App) -> Result<()> {
        tracing::info!("Performing shutdown cleanup...");

        if self.save_on_exit {
            tracing::info!("Saving state before exit...");
            app.save_state()?;
        }

        tracing::info!("Cleanup complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use growlab_core::clock::SystemClock;
    use growlab_core::config::GameConfig;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_shutdown_manager_new() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown_requested());
        assert!(manager.should_save_on_exit());
    }

    #[test]
    fn test_shutdown_request() {
        let manager = ShutdownManager::new();
        manager.request_shutdown();
        assert!(manager.is_shutdown_requested());
    }

    #[test]
    fn test_save_on_exit() {
        let mut manager = ShutdownManager::new();
        manager.set_save_on_exit(false);
        assert!(!manager.should_save_on_exit());
    }

    #[tokio::test]
    async fn test_wait_returns_after_request() {
        let manager = Arc::new(ShutdownManager::new());
        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait should resolve")
            .unwrap();
    }

    #[test]
    fn test_cleanup_writes_snapshot() {
        let path = std::env::temp_dir().join(format!("growlab-shutdown-{}.gz", Uuid::new_v4()));
        let app = App::in_memory(GameConfig::default(), Arc::new(SystemClock))
            .with_snapshot_path(&path);

        ShutdownManager::new().cleanup(&app).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).ok();
    }
}
