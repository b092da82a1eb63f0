//! PluginHost - runs the load → inject → register → bind pipeline

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::PluginHostError;
use super::loader::PluginLoader;
use super::registrar::Registrar;
use super::registry::ControllerRegistry;
use crate::engine::ReconcileEngine;

/// An artifact that did not make it through the pipeline
#[derive(Debug)]
pub struct ArtifactFailure {
    pub path: PathBuf,
    pub error: PluginHostError,
}

impl ArtifactFailure {
    /// Short failure label, as logged
    pub fn kind(&self) -> &'static str {
        self.error.failure_kind()
    }
}

/// Outcome of loading one directory
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Controllers registered and bound, in load order
    pub loaded: Vec<String>,
    /// Artifacts that failed at any stage, in discovery order
    pub failures: Vec<ArtifactFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the loader, registrar and registry for one host process
pub struct PluginHost {
    loader: PluginLoader,
    registrar: Registrar,
    registry: Arc<ControllerRegistry>,
}

impl PluginHost {
    pub fn new(loader: PluginLoader, registrar: Registrar) -> Self {
        Self {
            loader,
            registrar,
            registry: Arc::new(ControllerRegistry::new()),
        }
    }

    /// Share the registry, e.g. with an introspection endpoint
    pub fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Load every artifact under `dir` and bind it to `engine`.
    ///
    /// Only a missing directory is an error. Each artifact failure is logged,
    /// recorded in the report, and the walk moves on.
    pub fn load_directory(
        &self,
        dir: &Path,
        engine: &dyn ReconcileEngine,
    ) -> Result<LoadReport, PluginHostError> {
        if !dir.is_dir() {
            return Err(PluginHostError::PluginDirNotFound {
                path: dir.to_path_buf(),
            });
        }

        tracing::info!(dir = %dir.display(), "Loading controllers");
        let mut report = LoadReport::default();

        for path in self.loader.discover(dir) {
            match self.load_artifact(&path, engine) {
                Ok(name) => report.loaded.push(name),
                Err(error) => {
                    tracing::error!(
                        path = %path.display(),
                        failure = error.failure_kind(),
                        error = %error,
                        "Failed to load controller"
                    );
                    report.failures.push(ArtifactFailure { path, error });
                }
            }
        }

        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "Controller loading finished"
        );
        Ok(report)
    }

    /// Run one artifact through the pipeline, returning its controller name.
    ///
    /// A bind failure leaves the controller registered but unbound.
    pub fn load_artifact(
        &self,
        path: &Path,
        engine: &dyn ReconcileEngine,
    ) -> Result<String, PluginHostError> {
        // 1. Load and construct
        let mut controller = self.loader.load(path)?;
        let name = controller.name().to_string();

        // 2. Inject capabilities while we still hold the only reference
        let capabilities = self.registrar.inject(&mut controller);

        // 3. Register
        let controller = Arc::new(controller);
        self.registry.register(Arc::clone(&controller))?;

        // 4. Bind
        let kind = self.registrar.target_kind(&controller);
        self.registrar.bind(controller, kind.clone(), engine)?;

        tracing::info!(
            controller = %name,
            path = %path.display(),
            kind = %kind,
            capabilities = ?capabilities,
            "Controller loaded"
        );
        Ok(name)
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("loader", self.loader.config())
            .field("controllers", &self.registry.list())
            .finish_non_exhaustive()
    }
}
