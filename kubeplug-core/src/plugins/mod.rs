//! Controller plugin system
//!
//! Turns a directory of independently built dynamic libraries into running
//! controllers:
//!
//! - [`PluginLoader`]: discovers artifacts and constructs controller instances
//! - [`Registrar`]: injects host capabilities and binds controllers to an engine
//! - [`ControllerRegistry`]: the name-indexed set of live controllers
//! - [`PluginHost`]: runs the whole pipeline over a directory
//!
//! # Artifact Contract
//!
//! Each artifact must export the symbols generated by
//! [`kubeplug_api::export_controller!`]. The exported name is the registry key.
//! An artifact that fails at any step is logged and skipped; the rest of the
//! directory still loads.
//!
//! # Example
//!
//! ```ignore
//! use kubeplug_core::plugins::{LoaderConfig, PluginHost, PluginLoader, Registrar};
//!
//! let registrar = Registrar::new(client.clone(), ResourceKind::config_map());
//! let host = PluginHost::new(PluginLoader::new(LoaderConfig::default()), registrar);
//!
//! let report = host.load_directory(Path::new("./plugins"), &manager)?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.path.display(), failure.error);
//! }
//! ```

mod artifact;
mod capability;
mod error;
mod host;
mod loader;
mod registrar;
mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifact::{ArtifactOpener, ControllerArtifact, DylibArtifact, DylibOpener};
pub use capability::{ClientInjector, Injector};
pub use error::{BindError, LoadError, LoadErrorKind, OpenSource, PluginHostError, RegistryError};
pub use host::{ArtifactFailure, LoadReport, PluginHost};
pub use loader::{ControllerDescriptor, LoadedController, LoaderConfig, PluginLoader};
pub use registrar::Registrar;
pub use registry::{ControllerInfo, ControllerRegistry};
