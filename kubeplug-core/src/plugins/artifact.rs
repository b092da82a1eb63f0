//! Opening controller artifacts and resolving their exports
//!
//! [`ArtifactOpener`] turns a path into a [`ControllerArtifact`], and the
//! artifact resolves the three exports every controller must provide. The
//! production opener is [`DylibOpener`]; tests substitute their own.

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use kubeplug_api::{
    API_VERSION_SYMBOL, ApiVersionFn, CREATE_SYMBOL, ConstructResult, ControllerError,
    ControllerNameFn, CreateControllerFn, NAME_SYMBOL,
};

use super::error::LoadError;

/// Opens artifacts found during discovery
pub trait ArtifactOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn ControllerArtifact>, LoadError>;
}

/// An opened artifact whose exports can be resolved.
///
/// Each method resolves one export and checks its shape, reporting a
/// [`LoadError::ContractViolation`] naming the symbol when it cannot.
/// The artifact must stay alive for as long as anything it constructed does.
pub trait ControllerArtifact: Send + Sync {
    fn path(&self) -> &Path;

    /// Value of the exported API version
    fn api_version(&self) -> Result<u32, LoadError>;

    /// Value of the exported controller name
    fn controller_name(&self) -> Result<String, LoadError>;

    /// Check that a constructor is exported, without calling it
    fn has_constructor(&self) -> Result<(), LoadError>;

    /// Call the exported constructor
    fn construct(&self) -> Result<ConstructResult, LoadError>;
}

/// Opens native dynamic libraries with `libloading`
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibOpener;

impl ArtifactOpener for DylibOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn ControllerArtifact>, LoadError> {
        // SAFETY: Loading a library runs its initializers. Only artifacts placed
        // in the configured plugin directory are opened.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::open_failed(path, e))?;
        Ok(Arc::new(DylibArtifact {
            path: path.to_path_buf(),
            library,
        }))
    }
}

/// A controller artifact backed by a loaded dynamic library
pub struct DylibArtifact {
    path: PathBuf,
    library: Library,
}

impl DylibArtifact {
    /// Resolve `symbol` as a function of type `F`, copying the pointer out.
    ///
    /// The copy is only valid while `self.library` is loaded.
    fn function<F: Copy>(&self, symbol: &str) -> Result<F, LoadError> {
        // SAFETY: F is one of the exported signatures from kubeplug-api; the
        // API version handshake guards against mismatched layouts.
        let sym = unsafe { self.library.get::<F>(symbol.as_bytes()) }
            .map_err(|e| LoadError::contract(&self.path, symbol, e.to_string()))?;
        Ok(*sym)
    }
}

impl ControllerArtifact for DylibArtifact {
    fn path(&self) -> &Path {
        &self.path
    }

    fn api_version(&self) -> Result<u32, LoadError> {
        let version_fn: ApiVersionFn = self.function(API_VERSION_SYMBOL)?;
        Ok(version_fn())
    }

    fn controller_name(&self) -> Result<String, LoadError> {
        let name_fn: ControllerNameFn = self.function(NAME_SYMBOL)?;
        let ptr = name_fn();
        if ptr.is_null() {
            return Err(LoadError::contract(
                &self.path,
                NAME_SYMBOL,
                "returned a null pointer",
            ));
        }
        // SAFETY: Non-null and produced by `export_controller!`, which emits a
        // NUL-terminated static string.
        let name = unsafe { CStr::from_ptr(ptr) };
        name.to_str()
            .map(str::to_string)
            .map_err(|e| LoadError::contract(&self.path, NAME_SYMBOL, format!("not UTF-8: {}", e)))
    }

    fn has_constructor(&self) -> Result<(), LoadError> {
        self.function::<CreateControllerFn>(CREATE_SYMBOL).map(|_| ())
    }

    fn construct(&self) -> Result<ConstructResult, LoadError> {
        let create_fn: CreateControllerFn = self.function(CREATE_SYMBOL)?;
        let raw = create_fn();
        if raw.is_null() {
            return Ok(Err(ControllerError::construction(
                "constructor returned a null pointer",
            )));
        }
        // SAFETY: The pointer came from Box::into_raw in `export_controller!`
        // and ownership passes to us exactly once.
        let result = unsafe { Box::from_raw(raw) };
        Ok(*result)
    }
}
