//! Cache Module
//!
//! Provides concurrent in-memory storage with per-entry expiration.

mod entry;
mod stats;
mod store;


// Re-export public types
pub(crate) use entry::Entry;
pub use stats::CacheStats;
pub use store::Store;
