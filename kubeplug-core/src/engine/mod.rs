//! Reconciliation engine
//!
//! The plugin host only needs [`ReconcileEngine::watch`]. [`Manager`] is the
//! in-process implementation: it watches a [`MemoryClient`](crate::client::MemoryClient)
//! and drives each bound controller through a deduplicating work queue.

mod backoff;
mod manager;
mod queue;
mod stats;

use std::sync::Arc;

use kubeplug_api::{Controller, ResourceKind};

use crate::plugins::BindError;

pub use backoff::BackoffPolicy;
pub use manager::{Manager, ManagerConfig, ManagerError};
pub use queue::WorkQueue;
pub use stats::{EngineStats, StatsSnapshot};

/// A request to reconcile `kind` objects with `controller`
#[derive(Clone)]
pub struct Binding {
    pub controller_name: String,
    pub kind: ResourceKind,
    pub controller: Arc<dyn Controller>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("controller_name", &self.controller_name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The engine-side interface the plugin host binds controllers through
pub trait ReconcileEngine: Send + Sync {
    /// Register a watch. Must be called before the engine starts.
    fn watch(&self, binding: Binding) -> Result<(), BindError>;
}
