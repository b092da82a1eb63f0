//! Error types for controller authors

use thiserror::Error;

use crate::types::{ObjectKey, ResourceKind};

/// Errors returned by a data-access [`Client`](crate::Client)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The requested object does not exist
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: ObjectKey },

    /// The write lost a race with a concurrent update
    #[error("Conflict on {kind} {key}: {message}")]
    Conflict {
        kind: ResourceKind,
        key: ObjectKey,
        message: String,
    },

    /// The request was malformed
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    /// Whether this error means "the object does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Turn a not-found error into `Ok(None)`, passing every other error through.
///
/// Reconcilers use this to treat a deleted object as a finished no-op.
pub fn ignore_not_found<T>(result: Result<T, ClientError>) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Errors that controllers can return
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Data-access failure
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// The controller could not be constructed
    #[error("Construction failed: {0}")]
    Construction(String),

    /// A required capability was never injected
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    /// The controller panicked
    #[error("Controller panicked: {0}")]
    Panicked(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl ControllerError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a construction error
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Build a `Panicked` error from a caught panic payload
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}
