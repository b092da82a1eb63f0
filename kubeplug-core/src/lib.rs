//! kubeplug-core: host library for dynamically loaded controllers
//!
//! This crate provides everything the `kubeplug` binary wires together:
//!
//! - **Plugin pipeline** - [`PluginHost`] loads controller artifacts with
//!   [`PluginLoader`], injects capabilities via [`Registrar`], and records
//!   them in the [`ControllerRegistry`]
//! - **Reconciliation engine** - [`ReconcileEngine`] is the binding interface;
//!   [`Manager`] is the in-process implementation
//! - **Data access** - [`MemoryClient`] stores objects and publishes watch events
//! - **Logging** - [`TracingRecorder`] forwards controller log lines to `tracing`
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use kubeplug_api::ResourceKind;
//! use kubeplug_core::{
//!     LoaderConfig, Manager, ManagerConfig, MemoryClient, PluginHost, PluginLoader, Registrar,
//! };
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(MemoryClient::new());
//!     let manager = Manager::new(client.clone(), ManagerConfig::default());
//!     let registrar = Registrar::new(client, ResourceKind::config_map());
//!     let host = PluginHost::new(PluginLoader::new(LoaderConfig::default()), registrar);
//!
//!     let report = host.load_directory(Path::new("./plugins"), &manager)?;
//!     println!("loaded {:?}", report.loaded);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod engine;
pub mod plugins;
pub mod recorder;

pub use client::{MemoryClient, SeedError, WatchChange, WatchEvent};
pub use engine::{
    BackoffPolicy, Binding, EngineStats, Manager, ManagerConfig, ManagerError, ReconcileEngine,
    StatsSnapshot,
};
pub use plugins::{
    ArtifactFailure, BindError, ControllerInfo, ControllerRegistry, LoadError, LoadReport,
    LoadedController, LoaderConfig, PluginHost, PluginHostError, PluginLoader, Registrar,
    RegistryError,
};
pub use recorder::TracingRecorder;
