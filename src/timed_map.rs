//! Timed Map
//!
//! Owns a shared store together with the sweeper that keeps it tidy.

use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Store;
use crate::error::Result;
use crate::tasks::Sweeper;

// == Timed Map ==
/// An expiring key-value map with an optional background sweeper.
///
/// Every [`Store`] operation is available through `Deref`.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use timed_map::TimedMap;
///
/// # async fn run() -> timed_map::error::Result<()> {
/// let map = TimedMap::with_sweep_interval(Duration::from_secs(5)).await?;
/// map.set("session", 42, Duration::from_secs(30));
/// assert_eq!(map.get("session"), Some(42));
/// map.stop_sweeper().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TimedMap<K, V> {
    store: Arc<Store<K, V>>,
    sweeper: Sweeper,
}

impl<K, V> TimedMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates an empty map without a running sweeper.
    ///
    /// Expired entries are still hidden from reads and removed when read.
    pub fn new() -> Self {
        Self::from_store(Store::new())
    }

    /// Wraps an existing store, for example one built with
    /// [`Store::with_stats`], without starting the sweeper.
    pub fn from_store(store: Store<K, V>) -> Self {
        Self {
            store: Arc::new(store),
            sweeper: Sweeper::new(),
        }
    }

    /// Creates an empty map and starts sweeping it every `interval`.
    pub async fn with_sweep_interval(interval: Duration) -> Result<Self> {
        let map = Self::new();
        map.start_sweeper(interval).await?;
        Ok(map)
    }

    // == Sweeper Control ==
    /// Starts or restarts the sweeper at `interval`.
    pub async fn start_sweeper(&self, interval: Duration) -> Result<()> {
        self.sweeper.start(self.store.clone(), interval).await
    }

    /// Stops the sweeper and waits for its loop to exit.
    pub async fn stop_sweeper(&self) {
        self.sweeper.stop().await;
    }

    /// Returns true while the sweeper is running.
    pub async fn is_sweeping(&self) -> bool {
        self.sweeper.is_running().await
    }

    // == Store Access ==
    /// Returns a shared handle to the underlying store.
    pub fn store(&self) -> Arc<Store<K, V>> {
        self.store.clone()
    }
}

impl<K, V> Default for TimedMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Deref for TimedMap<K, V> {
    type Target = Store<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
