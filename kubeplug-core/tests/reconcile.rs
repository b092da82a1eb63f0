//! End to end: load controllers through the host, start the manager, and
//! watch them react to store changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kubeplug_api::{
    API_VERSION, Action, Client, ClientAware, ConstructResult, Controller, ControllerError,
    MemoryRecorder, ObjectKey, ReconcileContext, ReconcileRequest, Resource, ResourceKind,
    ignore_not_found,
};
use kubeplug_core::plugins::{ArtifactOpener, ControllerArtifact};
use kubeplug_core::{
    LoadError, LoaderConfig, Manager, ManagerConfig, MemoryClient, PluginHost, PluginLoader,
    Registrar,
};
use tokio_util::sync::CancellationToken;

/// Logs once per existing object of its kind
struct Echo {
    kind: ResourceKind,
    client: Option<Arc<dyn Client>>,
}

impl ClientAware for Echo {
    fn set_client(&mut self, client: Arc<dyn Client>) {
        self.client = Some(client);
    }
}

impl Controller for Echo {
    fn reconcile(
        &self,
        ctx: &ReconcileContext,
        request: &ReconcileRequest,
    ) -> Result<Action, ControllerError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ControllerError::MissingCapability("client".into()))?;
        match ignore_not_found(client.get(&self.kind, &request.key))? {
            Some(object) => ctx.log_info(&format!("{} {}", object.kind.kind, object.key)),
            None => ctx.log_debug(&format!("{} gone", request.key)),
        }
        Ok(Action::await_change())
    }

    fn resource_kind(&self) -> Option<ResourceKind> {
        Some(self.kind.clone())
    }

    fn as_client_aware(&mut self) -> Option<&mut dyn ClientAware> {
        Some(self)
    }
}

/// `<stem>.plugin` becomes controller `<stem>` watching `Secret` when the
/// stem starts with "secret", `ConfigMap` otherwise
struct EchoArtifact(PathBuf);

impl EchoArtifact {
    fn stem(&self) -> String {
        self.0
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl ControllerArtifact for EchoArtifact {
    fn path(&self) -> &Path {
        &self.0
    }

    fn api_version(&self) -> Result<u32, LoadError> {
        Ok(API_VERSION)
    }

    fn controller_name(&self) -> Result<String, LoadError> {
        Ok(self.stem())
    }

    fn has_constructor(&self) -> Result<(), LoadError> {
        Ok(())
    }

    fn construct(&self) -> Result<ConstructResult, LoadError> {
        let kind = if self.stem().starts_with("secret") {
            ResourceKind::secret()
        } else {
            ResourceKind::config_map()
        };
        Ok(Ok(Box::new(Echo { kind, client: None })))
    }
}

struct EchoOpener;

impl ArtifactOpener for EchoOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn ControllerArtifact>, LoadError> {
        Ok(Arc::new(EchoArtifact(path.to_path_buf())))
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test]
async fn loaded_controllers_reconcile_their_own_kind() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("configmaps.plugin"), b"").unwrap();
    std::fs::write(dir.path().join("secrets.plugin"), b"").unwrap();

    let client = Arc::new(MemoryClient::new());
    client
        .apply(
            Resource::new(ResourceKind::config_map(), ObjectKey::new("default", "app"))
                .with_data("mode", "fast"),
        )
        .unwrap();

    let recorder = Arc::new(MemoryRecorder::new());
    let manager = Arc::new(
        Manager::new(client.clone(), ManagerConfig::default()).with_recorder(recorder.clone()),
    );
    let host = PluginHost::new(
        PluginLoader::with_opener(
            LoaderConfig {
                extensions: vec!["plugin".into()],
                ..LoaderConfig::default()
            },
            Arc::new(EchoOpener),
        ),
        Registrar::new(client.clone(), ResourceKind::config_map()),
    );

    let report = host.load_directory(dir.path(), manager.as_ref()).unwrap();
    assert!(report.is_clean());
    assert_eq!(host.registry().len(), 2);

    let token = CancellationToken::new();
    let run = {
        let manager = Arc::clone(&manager);
        let token = token.clone();
        tokio::spawn(async move { manager.start(token).await })
    };

    // Existing ConfigMap is picked up by the initial list
    wait_for(|| recorder.len() == 1).await;
    let lines = recorder.lines();
    assert_eq!(lines[0].controller, "configmaps");
    assert_eq!(lines[0].message, "ConfigMap default/app");

    // A new Secret goes only to the secret controller
    client
        .apply(Resource::new(
            ResourceKind::secret(),
            ObjectKey::new("system", "token"),
        ))
        .unwrap();
    wait_for(|| recorder.len() == 2).await;
    let lines = recorder.lines();
    assert_eq!(lines[1].controller, "secrets");
    assert_eq!(lines[1].message, "Secret system/token");

    // Deleting is a no-op reconcile, not an error
    client
        .delete(&ResourceKind::secret(), &ObjectKey::new("system", "token"))
        .unwrap();
    wait_for(|| recorder.len() == 3).await;
    assert_eq!(manager.stats().snapshot().errors, 0);

    token.cancel();
    run.await.unwrap().unwrap();
}
