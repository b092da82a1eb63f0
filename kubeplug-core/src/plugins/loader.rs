//! PluginLoader - discovers artifacts and turns them into controller instances

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, mpsc};
use std::time::Duration;

use kubeplug_api::{
    API_VERSION, API_VERSION_SYMBOL, Action, ConstructResult, Controller, ControllerError,
    NAME_SYMBOL, ReconcileContext, ReconcileRequest, ResourceKind,
};

use super::artifact::{ArtifactOpener, ControllerArtifact, DylibOpener};
use super::error::LoadError;

/// Configuration for PluginLoader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// File extensions (without the dot) treated as controller artifacts
    pub extensions: Vec<String>,
    /// Upper bound on a constructor call; `None` waits forever
    pub construct_timeout: Option<Duration>,
    /// Follow symlinks while walking the plugin directory
    pub follow_links: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec![std::env::consts::DLL_EXTENSION.to_string()],
            construct_timeout: Some(Duration::from_secs(30)),
            follow_links: true,
        }
    }
}

/// A validated artifact, ready to be instantiated.
///
/// Holding the descriptor keeps the artifact (and its code) loaded.
#[derive(Clone)]
pub struct ControllerDescriptor {
    name: String,
    artifact_path: PathBuf,
    artifact: Arc<dyn ControllerArtifact>,
}

impl ControllerDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("artifact_path", &self.artifact_path)
            .finish()
    }
}

/// A live controller instance together with the artifact that built it
pub struct LoadedController {
    /// Declared before `descriptor` so the instance drops before its code unloads
    instance: Box<dyn Controller>,
    descriptor: ControllerDescriptor,
    bound_kind: OnceLock<ResourceKind>,
}

impl LoadedController {
    fn new(descriptor: ControllerDescriptor, instance: Box<dyn Controller>) -> Self {
        Self {
            instance,
            descriptor,
            bound_kind: OnceLock::new(),
        }
    }

    /// Registry key, taken from the artifact's exported name
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ControllerDescriptor {
        &self.descriptor
    }

    pub fn artifact_path(&self) -> &Path {
        &self.descriptor.artifact_path
    }

    /// Mutable access to the instance, only possible before it is shared
    pub fn instance_mut(&mut self) -> &mut dyn Controller {
        self.instance.as_mut()
    }

    /// The kind this controller was bound to, once binding succeeded
    pub fn bound_kind(&self) -> Option<&ResourceKind> {
        self.bound_kind.get()
    }

    /// Record a successful binding. Returns false if already bound.
    pub(crate) fn mark_bound(&self, kind: ResourceKind) -> bool {
        self.bound_kind.set(kind).is_ok()
    }
}

impl Controller for LoadedController {
    fn reconcile(
        &self,
        ctx: &ReconcileContext,
        request: &ReconcileRequest,
    ) -> Result<Action, ControllerError> {
        self.instance.reconcile(ctx, request)
    }

    fn resource_kind(&self) -> Option<ResourceKind> {
        self.instance.resource_kind()
    }
}

impl std::fmt::Debug for LoadedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedController")
            .field("descriptor", &self.descriptor)
            .field("bound_kind", &self.bound_kind.get())
            .finish()
    }
}

/// Discovers controller artifacts on disk and instantiates them
pub struct PluginLoader {
    config: LoaderConfig,
    opener: Arc<dyn ArtifactOpener>,
}

impl PluginLoader {
    /// Create a loader that opens native dynamic libraries
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_opener(config, Arc::new(DylibOpener))
    }

    /// Create a loader with a custom opener
    pub fn with_opener(config: LoaderConfig, opener: Arc<dyn ArtifactOpener>) -> Self {
        Self { config, opener }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Lazily walk `dir` and yield every file with a controller extension.
    ///
    /// Directories and non-matching files are skipped. Entries that cannot be
    /// read are logged and skipped; the walk continues.
    pub fn discover<'a>(&'a self, dir: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        walkdir::WalkDir::new(dir)
            .follow_links(self.config.follow_links)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable plugin directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(move |path| self.is_candidate(path))
    }

    /// Whether `path` has one of the configured artifact extensions
    pub fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|e| e == ext))
    }

    /// Open and validate an artifact without constructing anything
    pub fn resolve(&self, path: &Path) -> Result<ControllerDescriptor, LoadError> {
        // 1. Open the artifact
        let artifact = self.opener.open(path)?;

        // 2. Check API version
        let version = artifact.api_version()?;
        if version != API_VERSION {
            return Err(LoadError::contract(
                path,
                API_VERSION_SYMBOL,
                format!("API version mismatch: host expects {API_VERSION}, artifact has {version}"),
            ));
        }

        // 3. Controller name
        let name = artifact.controller_name()?;
        if name.trim().is_empty() {
            return Err(LoadError::contract(path, NAME_SYMBOL, "controller name is empty"));
        }

        // 4. Constructor must be present before we commit to anything
        artifact.has_constructor()?;

        Ok(ControllerDescriptor {
            name,
            artifact_path: path.to_path_buf(),
            artifact,
        })
    }

    /// Invoke the descriptor's constructor exactly once
    pub fn instantiate(
        &self,
        descriptor: ControllerDescriptor,
    ) -> Result<LoadedController, LoadError> {
        let path = descriptor.artifact_path.clone();
        let result = match self.config.construct_timeout {
            Some(timeout) => construct_with_timeout(&descriptor, timeout)?,
            None => construct_guarded(descriptor.artifact.as_ref())?,
        };

        match result {
            Ok(instance) => Ok(LoadedController::new(descriptor, instance)),
            Err(source) => Err(LoadError::ConstructionFailed { path, source }),
        }
    }

    /// Resolve and instantiate the artifact at `path`
    pub fn load(&self, path: &Path) -> Result<LoadedController, LoadError> {
        let descriptor = self.resolve(path)?;
        tracing::debug!(
            path = %path.display(),
            controller = %descriptor.name,
            "Resolved controller artifact"
        );
        self.instantiate(descriptor)
    }
}

/// Call the constructor, turning a host-side panic into a construction error
fn construct_guarded(artifact: &dyn ControllerArtifact) -> Result<ConstructResult, LoadError> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| artifact.construct())) {
        Ok(result) => result,
        Err(payload) => Ok(Err(ControllerError::from_panic(payload.as_ref()))),
    }
}

/// Run the constructor on its own thread and give up after `timeout`.
///
/// The thread owns a clone of the artifact, so an abandoned constructor keeps
/// its code mapped until it returns.
fn construct_with_timeout(
    descriptor: &ControllerDescriptor,
    timeout: Duration,
) -> Result<ConstructResult, LoadError> {
    let (tx, rx) = mpsc::channel();
    let artifact = Arc::clone(&descriptor.artifact);

    std::thread::Builder::new()
        .name(format!("construct-{}", descriptor.name))
        .spawn(move || {
            let result = construct_guarded(artifact.as_ref());
            // Receiver is gone if we already timed out
            let _ = tx.send(result);
        })
        .map_err(|e| LoadError::ConstructionFailed {
            path: descriptor.artifact_path.clone(),
            source: ControllerError::construction(format!(
                "failed to spawn constructor thread: {}",
                e
            )),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(LoadError::ConstructionTimeout {
            path: descriptor.artifact_path.clone(),
            timeout,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Ok(Err(ControllerError::construction(
            "constructor thread exited without a result",
        ))),
    }
}
