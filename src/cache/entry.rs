//! Entry Module
//!
//! Defines the structure for individual map entries with expiry support.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::error;

/// Callback invoked with an entry's value when the entry is removed.
pub(crate) type ExpiryCallback<V> = Arc<dyn Fn(V) + Send + Sync>;

// == Entry ==
/// A stored value with its deadline and optional expiry callback.
pub(crate) struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Deadline after which the entry is expired
    pub expires_at: DateTime<Utc>,
    /// Invoked once with the value when the entry is removed
    pub on_expire: Option<ExpiryCallback<V>>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a new entry that expires `ttl` from now.
    pub fn new(value: V, ttl: Duration, on_expire: Option<ExpiryCallback<V>>) -> Self {
        Self {
            value,
            expires_at: deadline_after(current_time(), ttl),
            on_expire,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// An entry whose deadline equals `now` is still live; it expires once
    /// the clock moves strictly past the deadline.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    // == Expiry Mutation ==
    /// Moves the deadline to `ttl` from now.
    pub fn reset_expiry(&mut self, ttl: Duration) {
        self.expires_at = deadline_after(current_time(), ttl);
    }

    /// Shifts the current deadline by `delta`, which may be negative.
    pub fn extend_expiry(&mut self, delta: TimeDelta) {
        self.expires_at = self.expires_at.checked_add_signed(delta).unwrap_or(
            if delta < TimeDelta::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            },
        );
    }

    // == Fire ==
    /// Consumes the entry and hands its value to the callback, if any.
    ///
    /// Must only be called once the entry is detached from the map. A panic
    /// inside the callback is caught and logged.
    pub fn fire(self) {
        let Some(callback) = self.on_expire else {
            return;
        };
        let value = self.value;

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(value))) {
            log_panic(&*payload);
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("value", &self.value)
            .field("expires_at", &self.expires_at)
            .field("on_expire", &self.on_expire.is_some())
            .finish()
    }
}

// == Utility Functions ==
/// Returns the current wall-clock time.
pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}

/// Returns `now + ttl`, clamped to the latest representable time.
pub fn deadline_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn log_panic(payload: &(dyn Any + Send + 'static)) {
    let message: Option<Cow<'_, str>> = (payload.downcast_ref::<&str>().map(|s| (*s).into()))
        .or_else(|| payload.downcast_ref::<String>().map(Into::into));

    match message {
        Some(m) => error!("Expiry callback panicked at '{}'", m),
        None => error!("Expiry callback panicked"),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_entry_creation() {
        let entry = Entry::new("value", Duration::from_secs(60), None);

        assert_eq!(entry.value, "value");
        assert!(entry.on_expire.is_none());
        assert!(!entry.is_expired_at(current_time()));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_time();
        let entry = Entry {
            value: 1,
            expires_at: now,
            on_expire: None,
        };

        // Live at the deadline, expired one millisecond past it
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let entry = Entry::new(1, Duration::ZERO, None);

        std::thread::sleep(Duration::from_millis(5));
        assert!(entry.is_expired_at(current_time()));
    }

    #[test]
    fn test_reset_expiry() {
        let mut entry = Entry::new(1, Duration::ZERO, None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(entry.is_expired_at(current_time()));

        entry.reset_expiry(Duration::from_secs(60));
        assert!(!entry.is_expired_at(current_time()));
    }

    #[test]
    fn test_extend_expiry_is_relative_to_deadline() {
        let mut entry = Entry::new(1, Duration::from_secs(60), None);
        let before = entry.expires_at;

        entry.extend_expiry(TimeDelta::seconds(30));
        assert_eq!(entry.expires_at, before + TimeDelta::seconds(30));

        entry.extend_expiry(TimeDelta::seconds(-120));
        assert_eq!(entry.expires_at, before - TimeDelta::seconds(90));
        assert!(entry.is_expired_at(current_time()));
    }

    #[test]
    fn test_deadline_saturates() {
        let now = current_time();
        assert_eq!(deadline_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);

        let mut entry = Entry::new(1, Duration::MAX, None);
        entry.extend_expiry(TimeDelta::days(1));
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_fire_invokes_callback_with_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ExpiryCallback<&str> = Arc::new(move |v| sink.lock().unwrap().push(v));

        Entry::new("gone", Duration::from_secs(1), Some(callback)).fire();

        assert_eq!(*seen.lock().unwrap(), vec!["gone"]);
    }

    #[test]
    fn test_fire_without_callback() {
        Entry::new(1, Duration::from_secs(1), None).fire();
    }

    #[test]
    fn test_fire_catches_panicking_callback() {
        let callback: ExpiryCallback<i32> = Arc::new(|_| panic!("boom"));

        // Must not unwind into the caller
        Entry::new(1, Duration::from_secs(1), Some(callback)).fire();
    }
}
