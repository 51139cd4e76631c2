//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the map.
//!
//! # Tasks
//! - Sweeper: Removes expired entries at a configured interval

mod sweeper;

pub use sweeper::Sweeper;
