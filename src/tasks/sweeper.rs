//! Sweeper Task
//!
//! Background task that periodically reclaims expired entries nobody reads.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::Store;
use crate::error::{Result, TimedMapError};

// == Sweep Run ==
/// Handle to one running sweep loop.
#[derive(Debug)]
struct SweepRun {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SweepRun {
    /// Signals the loop and waits for it to exit.
    async fn shutdown(self) {
        // The loop may already be gone if the runtime is shutting down
        let _ = self.stop_tx.send(());

        if let Err(e) = self.handle.await {
            warn!("Sweeper loop did not exit cleanly: {}", e);
        }
    }
}

// == Sweeper ==
/// Periodic expiry sweeper, `Stopped` until started.
///
/// Each tick scans the whole store on the blocking pool, so a slow scan never
/// delays the next tick. Scans may overlap; the store tolerates that.
#[derive(Debug, Default)]
pub struct Sweeper {
    run: Mutex<Option<SweepRun>>,
}

impl Sweeper {
    // == Constructor ==
    /// Creates a stopped sweeper.
    pub fn new() -> Self {
        Self::default()
    }

    // == Start ==
    /// Starts sweeping `store` every `interval`.
    ///
    /// A sweeper that is already running is stopped first, and this call
    /// waits for its loop to exit before the new one starts. The first sweep
    /// happens one `interval` after the call.
    ///
    /// # Errors
    /// Returns [`TimedMapError::InvalidInterval`] if `interval` is zero.
    pub async fn start<K, V>(&self, store: Arc<Store<K, V>>, interval: Duration) -> Result<()>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(TimedMapError::InvalidInterval);
        }

        let mut run = self.run.lock().await;
        if let Some(previous) = run.take() {
            previous.shutdown().await;
            debug!("Previous sweeper stopped before restart");
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(sweep_loop(store, interval, stop_rx));
        *run = Some(SweepRun { stop_tx, handle });

        info!("Sweeper started with interval of {:?}", interval);
        Ok(())
    }

    // == Stop ==
    /// Stops the sweeper and waits until its loop has exited.
    ///
    /// No tick fires after this returns. Sweeps already dispatched run to
    /// completion. Stopping a sweeper that is not running does nothing.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        if let Some(current) = run.take() {
            current.shutdown().await;
            info!("Sweeper stopped");
        }
    }

    /// Returns true while a sweep loop is running.
    pub async fn is_running(&self) -> bool {
        self.run.lock().await.is_some()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        // Signal only; a destructor cannot wait for the loop
        if let Some(run) = self.run.get_mut().take() {
            let _ = run.stop_tx.send(());
        }
    }
}

async fn sweep_loop<K, V>(
    store: Arc<Store<K, V>>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Fires on an explicit stop and when the sender is dropped
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let store = store.clone();
                tokio::task::spawn_blocking(move || {
                    let removed = store.sweep();
                    if removed > 0 {
                        info!("Sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Sweep: no expired entries found");
                    }
                });
            }
        }
    }

    debug!("Sweep loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared_store() -> Arc<Store<&'static str, i32>> {
        Arc::new(Store::new())
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let store = shared_store();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let sweeper = Sweeper::new();
        sweeper
            .start(store.clone(), Duration::from_millis(500))
            .await
            .unwrap();

        // Already expired, and nobody reads it
        store.set_with_callback("b", 1, Duration::ZERO, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(store.len(), 0, "Expired entry should have been swept");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_sweeper_preserves_valid_entries() {
        let store = shared_store();
        store.set("long_lived", 1, Duration::from_secs(3600));

        let sweeper = Sweeper::new();
        sweeper
            .start(store.clone(), Duration::from_millis(50))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.get("long_lived"), Some(1));
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_sweeper_stop_halts_ticks() {
        let store = shared_store();
        let sweeper = Sweeper::new();
        sweeper
            .start(store.clone(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(sweeper.is_running().await);

        sweeper.stop().await;
        assert!(!sweeper.is_running().await);

        store.set("stale", 1, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // No sweep ran, so the entry is still counted
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stop_when_not_running() {
        let sweeper = Sweeper::new();

        sweeper.stop().await;
        sweeper.stop().await;
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_sweeper_restart_with_new_interval() {
        let store = shared_store();
        let sweeper = Sweeper::new();

        sweeper
            .start(store.clone(), Duration::from_secs(3600))
            .await
            .unwrap();
        sweeper
            .start(store.clone(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(sweeper.is_running().await);

        store.set("stale", 1, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.len(), 0);
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_sweeper_rejects_zero_interval() {
        let sweeper = Sweeper::new();

        let result = sweeper.start(shared_store(), Duration::ZERO).await;
        assert_eq!(result, Err(TimedMapError::InvalidInterval));
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_dropped_sweeper_releases_store() {
        let store = shared_store();
        let sweeper = Sweeper::new();
        sweeper
            .start(store.clone(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(Arc::strong_count(&store), 2);

        drop(sweeper);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(Arc::strong_count(&store), 1, "Loop should have exited");
    }
}
