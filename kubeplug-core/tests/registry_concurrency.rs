//! Registry stress test: concurrent readers and writers never see a torn map.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

use kubeplug_api::{
    API_VERSION, Action, ConstructResult, Controller, ControllerError, ReconcileContext,
    ReconcileRequest,
};
use kubeplug_core::plugins::{ArtifactOpener, ControllerArtifact};
use kubeplug_core::{
    ControllerRegistry, LoadError, LoadedController, LoaderConfig, PluginLoader, RegistryError,
};

const WRITERS: usize = 8;
const READERS: usize = 8;
const PER_WRITER: usize = 50;

struct Nop;

impl Controller for Nop {
    fn reconcile(
        &self,
        _ctx: &ReconcileContext,
        _request: &ReconcileRequest,
    ) -> Result<Action, ControllerError> {
        Ok(Action::await_change())
    }
}

/// Names each artifact after its file stem
struct StemArtifact(PathBuf);

impl ControllerArtifact for StemArtifact {
    fn path(&self) -> &Path {
        &self.0
    }

    fn api_version(&self) -> Result<u32, LoadError> {
        Ok(API_VERSION)
    }

    fn controller_name(&self) -> Result<String, LoadError> {
        Ok(self
            .0
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    fn has_constructor(&self) -> Result<(), LoadError> {
        Ok(())
    }

    fn construct(&self) -> Result<ConstructResult, LoadError> {
        Ok(Ok(Box::new(Nop)))
    }
}

struct StemOpener;

impl ArtifactOpener for StemOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn ControllerArtifact>, LoadError> {
        Ok(Arc::new(StemArtifact(path.to_path_buf())))
    }
}

fn controller(loader: &PluginLoader, name: &str) -> Arc<LoadedController> {
    Arc::new(loader.load(Path::new(&format!("/plugins/{name}.so"))).unwrap())
}

#[test]
fn concurrent_register_get_list_is_consistent() {
    let loader = Arc::new(PluginLoader::with_opener(
        LoaderConfig {
            construct_timeout: None,
            ..LoaderConfig::default()
        },
        Arc::new(StemOpener),
    ));
    let registry = Arc::new(ControllerRegistry::new());
    let barrier = Arc::new(Barrier::new(WRITERS + READERS));
    let mut handles = Vec::new();

    for writer in 0..WRITERS {
        let registry = Arc::clone(&registry);
        let loader = Arc::clone(&loader);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut rejected = 0;
            for i in 0..PER_WRITER {
                // Every name is contended by two writers
                let name = format!("c-{}-{}", writer / 2, i);
                match registry.register(controller(&loader, &name)) {
                    Ok(()) => {}
                    Err(RegistryError::DuplicateName { .. }) => rejected += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            rejected
        }));
    }

    for _ in 0..READERS {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..PER_WRITER * 4 {
                let names = registry.list();
                let unique: HashSet<&String> = names.iter().collect();
                assert_eq!(unique.len(), names.len(), "list returned duplicate names");
                for name in names.iter().take(5) {
                    let found = registry.get(name).unwrap();
                    assert_eq!(found.name(), name);
                }
            }
            0
        }));
    }

    let rejected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let expected = (WRITERS / 2) * PER_WRITER;
    assert_eq!(registry.len(), expected);
    assert_eq!(rejected, WRITERS * PER_WRITER - expected);
    assert_eq!(registry.list().len(), expected);
}

#[test]
fn failed_registration_does_not_replace_entry() {
    let loader = PluginLoader::with_opener(LoaderConfig::default(), Arc::new(StemOpener));
    let registry = ControllerRegistry::new();

    let first = controller(&loader, "alpha");
    registry.register(Arc::clone(&first)).unwrap();

    for _ in 0..10 {
        let err = registry.register(controller(&loader, "alpha")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    assert!(Arc::ptr_eq(&registry.get("alpha").unwrap(), &first));
}
