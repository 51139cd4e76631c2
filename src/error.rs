//! Error types for the timed map
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Timed Map Error Enum ==
/// Unified error type for the timed map.
///
/// Only operations that need a live entry fail. Reads such as
/// [`Store::get`](crate::cache::Store::get) report absence as `None`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedMapError {
    /// Key is absent or its entry has expired
    #[error("key not found")]
    KeyNotFound,

    /// Sweeper was started with a zero interval
    #[error("sweep interval must be greater than zero")]
    InvalidInterval,
}

// == Result Type Alias ==
/// Convenience Result type for the timed map.
pub type Result<T> = std::result::Result<T, TimedMapError>;
