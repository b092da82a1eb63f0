//! Data-access clients
//!
//! [`MemoryClient`] is the in-process store the host injects into controllers
//! and the source of the watch events that drive the [`Manager`](crate::engine::Manager).

mod memory;

pub use memory::{MemoryClient, SeedError, WatchChange, WatchEvent};
