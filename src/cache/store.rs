//! Store Module
//!
//! Concurrent map engine with lazy expiration on read and an O(1) entry count.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;

use crate::cache::entry::current_time;
use crate::cache::stats::StatsCounter;
use crate::cache::{CacheStats, Entry};
use crate::error::{Result, TimedMapError};

// == Store ==
/// Concurrent key-value storage where every entry carries a deadline.
///
/// All operations take `&self`; the map is sharded internally so callers on
/// different keys do not contend. Expired entries are removed by whichever
/// read discovers them first, or by [`Store::sweep`].
pub struct Store<K, V> {
    /// Key-value storage
    entries: DashMap<K, Entry<V>>,
    /// Number of entries not yet removed
    len: AtomicUsize,
    /// Activity counters, only kept when enabled
    stats: Option<StatsCounter>,
}

impl<K, V> Store<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            len: AtomicUsize::new(0),
            stats: None,
        }
    }

    /// Creates an empty store that keeps hit, miss and removal counters.
    ///
    /// Counting adds shared atomic writes to every read, so it is off by
    /// default.
    pub fn with_stats() -> Self {
        Self {
            stats: Some(StatsCounter::default()),
            ..Self::new()
        }
    }

    // == Set ==
    /// Stores a value that expires `ttl` from now.
    ///
    /// Overwriting a live key replaces its value, deadline and callback
    /// (clearing the callback) without firing the old one. Overwriting an
    /// expired key that has not been reaped yet fires the old callback.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.insert(key, Entry::new(value, ttl, None));
    }

    /// Stores a value that expires `ttl` from now and registers `callback`
    /// to receive the value when the entry is removed.
    pub fn set_with_callback<F>(&self, key: K, value: V, ttl: Duration, callback: F)
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        self.insert(key, Entry::new(value, ttl, Some(Arc::new(callback))));
    }

    fn insert(&self, key: K, entry: Entry<V>) {
        let now = current_time();
        let expired = match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                // Replacing keeps the count: one expiry, one insert
                let previous = occupied.insert(entry);
                previous.is_expired_at(now).then_some(previous)
            }
            MapEntry::Vacant(vacant) => {
                // Count while the shard is still locked so a racing removal
                // can never decrement first.
                let _guard = vacant.insert(entry);
                self.len.fetch_add(1, Ordering::AcqRel);
                None
            }
        };

        if let Some(previous) = expired {
            self.record(StatsCounter::record_expiration);
            previous.fire();
        }
    }

    // == Get ==
    /// Returns a copy of the value if the key is present and unexpired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.read_live(key, |entry| entry.value.clone());
        self.record_read(value.is_some());
        value
    }

    // == Contains ==
    /// Returns true if the key is present and unexpired.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let found = self.read_live(key, |_| ()).is_some();
        self.record_read(found);
        found
    }

    // == Expiry ==
    /// Returns the deadline of a live entry.
    pub fn expires_at<Q>(&self, key: &Q) -> Result<DateTime<Utc>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read_live(key, |entry| entry.expires_at)
            .ok_or(TimedMapError::KeyNotFound)
    }

    /// Moves the deadline of a live entry to `ttl` from now.
    pub fn set_expiry<Q>(&self, key: &Q, ttl: Duration) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.update_live(key, |entry| entry.reset_expiry(ttl))
    }

    /// Shifts the deadline of a live entry by `delta`.
    ///
    /// The shift is applied to the current deadline, not to now. A negative
    /// `delta` shortens the entry's lifetime.
    pub fn extend_expiry<Q>(&self, key: &Q, delta: TimeDelta) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.update_live(key, |entry| entry.extend_expiry(delta))
    }

    // == Remove ==
    /// Removes the entry, expired or not, firing its callback.
    ///
    /// Removing an absent key is a no-op.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.len.fetch_sub(1, Ordering::AcqRel);
            self.record(StatsCounter::record_removal);
            entry.fire();
        }
    }

    // == Flush ==
    /// Removes every entry, firing each callback once.
    pub fn flush(&self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }

    // == Sweep ==
    /// Removes all expired entries, firing their callbacks.
    ///
    /// Returns the number of entries removed by this call. Safe to run
    /// concurrently with other sweeps and with reads on the same keys.
    pub fn sweep(&self) -> usize {
        let now = current_time();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .iter()
            .filter(|key| self.remove_expired(*key, now))
            .count()
    }

    // == Length ==
    /// Returns the current number of entries.
    ///
    /// Expired entries count until a read or a sweep removes them.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Stats ==
    /// Returns a snapshot of the store's counters, or `None` if the store
    /// was not created with [`Store::with_stats`].
    pub fn stats(&self) -> Option<CacheStats> {
        self.stats
            .as_ref()
            .map(|stats| stats.snapshot(self.len()))
    }

    // == Internals ==
    fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn record(&self, update: impl FnOnce(&StatsCounter)) {
        if let Some(stats) = &self.stats {
            update(stats);
        }
    }

    fn record_read(&self, found: bool) {
        if found {
            self.record(StatsCounter::record_hit);
        } else {
            self.record(StatsCounter::record_miss);
        }
    }

    /// Runs `f` on a live entry, lazily removing it if it has expired.
    fn read_live<Q, R>(&self, key: &Q, f: impl FnOnce(&Entry<V>) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = current_time();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired_at(now) => return Some(f(entry.value())),
            Some(_) => {}
        }

        self.remove_expired(key, now);
        None
    }

    /// Runs `f` on a live entry under its shard's write lock.
    fn update_live<Q>(&self, key: &Q, f: impl FnOnce(&mut Entry<V>)) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = current_time();
        match self.entries.get_mut(key) {
            None => return Err(TimedMapError::KeyNotFound),
            Some(mut entry) if !entry.is_expired_at(now) => {
                f(entry.value_mut());
                return Ok(());
            }
            Some(_) => {}
        }

        self.remove_expired(key, now);
        Err(TimedMapError::KeyNotFound)
    }

    /// Removes the entry only if it is expired as of `now`.
    ///
    /// Check and delete happen under one lock, so of several concurrent
    /// callers at most one gets the entry back and fires its callback. The
    /// callback runs after the lock is released.
    fn remove_expired<Q>(&self, key: &Q, now: DateTime<Utc>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
        {
            Some((_, entry)) => {
                self.len.fetch_sub(1, Ordering::AcqRel);
                self.record(StatsCounter::record_expiration);
                entry.fire();
                true
            }
            None => false,
        }
    }
}

impl<K, V> Default for Store<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Store<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
