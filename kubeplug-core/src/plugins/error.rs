//! Plugin host error types

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use kubeplug_api::{ControllerError, ResourceKind};

/// Boxed error from whatever mechanism opened an artifact
pub type OpenSource = Box<dyn std::error::Error + Send + Sync>;

/// Why a single artifact could not be turned into a controller instance
#[derive(Error, Debug)]
pub enum LoadError {
    /// Artifact missing, corrupt, or built for another platform
    #[error("Failed to open artifact {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: OpenSource,
    },

    /// A required export is missing or does not have the expected shape
    #[error("Artifact {path} violates the controller contract at `{symbol}`: {reason}")]
    ContractViolation {
        path: PathBuf,
        symbol: String,
        reason: String,
    },

    /// The constructor returned an error (or panicked)
    #[error("Constructor in {path} failed: {source}")]
    ConstructionFailed {
        path: PathBuf,
        #[source]
        source: ControllerError,
    },

    /// The constructor did not return in time
    #[error("Constructor in {path} timed out after {timeout:?}")]
    ConstructionTimeout { path: PathBuf, timeout: Duration },
}

/// Discriminant of [`LoadError`], used as a structured log field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadErrorKind {
    OpenFailed,
    ContractViolation,
    ConstructionFailed,
    ConstructionTimeout,
}

impl LoadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenFailed => "open_failed",
            Self::ContractViolation => "contract_violation",
            Self::ConstructionFailed => "construction_failed",
            Self::ConstructionTimeout => "construction_timeout",
        }
    }
}

impl LoadError {
    pub fn open_failed(path: &Path, source: impl Into<OpenSource>) -> Self {
        Self::OpenFailed {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn contract(path: &Path, symbol: &str, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            path: path.to_path_buf(),
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::OpenFailed { .. } => LoadErrorKind::OpenFailed,
            Self::ContractViolation { .. } => LoadErrorKind::ContractViolation,
            Self::ConstructionFailed { .. } => LoadErrorKind::ConstructionFailed,
            Self::ConstructionTimeout { .. } => LoadErrorKind::ConstructionTimeout,
        }
    }

    /// The artifact this error is about
    pub fn path(&self) -> &Path {
        match self {
            Self::OpenFailed { path, .. }
            | Self::ContractViolation { path, .. }
            | Self::ConstructionFailed { path, .. }
            | Self::ConstructionTimeout { path, .. } => path,
        }
    }
}

/// Errors from the controller registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A controller with this name is already registered
    #[error("Controller '{name}' is already registered")]
    DuplicateName { name: String },

    /// No controller with this name
    #[error("Controller '{name}' not found")]
    NotFound { name: String },
}

/// The reconciliation engine refused a binding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The controller is already watching this kind
    #[error("Controller '{controller}' already watches {kind}")]
    DuplicateWatch {
        controller: String,
        kind: ResourceKind,
    },

    /// Watches can only be added before the engine starts
    #[error("Cannot bind '{controller}': engine already started")]
    EngineStarted { controller: String },

    /// Any other refusal
    #[error("Engine rejected '{controller}': {reason}")]
    Rejected { controller: String, reason: String },
}

/// Errors that can occur in the plugin host
#[derive(Error, Debug)]
pub enum PluginHostError {
    /// Plugin directory not found
    #[error("Plugin directory not found: {path}")]
    PluginDirNotFound { path: PathBuf },

    /// Artifact could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Registration was refused
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Binding was refused
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),
}

impl PluginHostError {
    /// Short failure label for structured logs
    pub fn failure_kind(&self) -> &'static str {
        match self {
            Self::PluginDirNotFound { .. } => "plugin_dir_not_found",
            Self::Load(e) => e.kind().as_str(),
            Self::Registry(RegistryError::DuplicateName { .. }) => "duplicate_name",
            Self::Registry(RegistryError::NotFound { .. }) => "not_found",
            Self::Bind(_) => "bind_failed",
        }
    }
}
