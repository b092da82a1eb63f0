//! In-memory artifacts for unit tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kubeplug_api::{
    API_VERSION, Action, Client, ClientAware, ConstructResult, Controller, ControllerError,
    ReconcileContext, ReconcileRequest, ResourceKind,
};

use super::artifact::{ArtifactOpener, ControllerArtifact};
use super::error::LoadError;
use super::loader::{LoadedController, LoaderConfig, PluginLoader};

type Constructor = Arc<dyn Fn() -> ConstructResult + Send + Sync>;

struct FnArtifact {
    path: PathBuf,
    name: String,
    constructor: Constructor,
}

impl ControllerArtifact for FnArtifact {
    fn path(&self) -> &Path {
        &self.path
    }

    fn api_version(&self) -> Result<u32, LoadError> {
        Ok(API_VERSION)
    }

    fn controller_name(&self) -> Result<String, LoadError> {
        Ok(self.name.clone())
    }

    fn has_constructor(&self) -> Result<(), LoadError> {
        Ok(())
    }

    fn construct(&self) -> Result<ConstructResult, LoadError> {
        Ok((self.constructor)())
    }
}

struct FnOpener {
    name: String,
    constructor: Constructor,
}

impl ArtifactOpener for FnOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn ControllerArtifact>, LoadError> {
        Ok(Arc::new(FnArtifact {
            path: path.to_path_buf(),
            name: self.name.clone(),
            constructor: Arc::clone(&self.constructor),
        }))
    }
}

/// Load a controller named `name` built by `constructor`
pub(crate) fn load_controller<F>(name: &str, constructor: F) -> LoadedController
where
    F: Fn() -> ConstructResult + Send + Sync + 'static,
{
    let opener = FnOpener {
        name: name.to_string(),
        constructor: Arc::new(constructor),
    };
    let config = LoaderConfig {
        construct_timeout: None,
        ..LoaderConfig::default()
    };
    PluginLoader::with_opener(config, Arc::new(opener))
        .load(&PathBuf::from(format!("/plugins/{name}.so")))
        .expect("test controller loads")
}

/// Controller with configurable kind and client capability
#[derive(Default)]
pub(crate) struct Probe {
    pub kind: Option<ResourceKind>,
    pub client_aware: bool,
    pub client: Option<Arc<dyn Client>>,
}

impl Probe {
    pub fn client_aware() -> Self {
        Self {
            client_aware: true,
            ..Self::default()
        }
    }

    pub fn with_kind(kind: ResourceKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

impl ClientAware for Probe {
    fn set_client(&mut self, client: Arc<dyn Client>) {
        self.client = Some(client);
    }
}

impl Controller for Probe {
    fn reconcile(
        &self,
        _ctx: &ReconcileContext,
        _request: &ReconcileRequest,
    ) -> Result<Action, ControllerError> {
        if self.client_aware && self.client.is_none() {
            return Err(ControllerError::MissingCapability("client".into()));
        }
        Ok(Action::await_change())
    }

    fn resource_kind(&self) -> Option<ResourceKind> {
        self.kind.clone()
    }

    fn as_client_aware(&mut self) -> Option<&mut dyn ClientAware> {
        if self.client_aware { Some(self) } else { None }
    }
}

/// Shorthand for a plain [`Probe`] controller named `name`
pub(crate) fn probe(name: &str) -> LoadedController {
    load_controller(name, || Ok(Box::new(Probe::default())))
}
