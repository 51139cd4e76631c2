//! Timed Map - A concurrent in-process key-value map with per-entry expiration
//!
//! Entries expire lazily on read and are reclaimed in the background by a
//! periodic sweeper. Removal of an entry can notify a callback with its value.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;
pub mod timed_map;

pub use cache::{CacheStats, Store};
pub use config::Config;
pub use error::{Result, TimedMapError};
pub use tasks::Sweeper;
pub use timed_map::TimedMap;
