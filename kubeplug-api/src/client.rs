//! Data-access client handed to controllers by the host

use crate::error::ClientError;
use crate::types::{ObjectKey, Resource, ResourceKind};

/// Read/write access to stored resources.
///
/// The host owns one client and shares it with every controller that asks for
/// it (see [`ClientAware`](crate::ClientAware)). Implementations must be safe
/// to call from many reconcile workers at once; controllers must not assume
/// exclusive access.
///
/// Calls are blocking. The engine runs reconciles on a blocking worker pool.
pub trait Client: Send + Sync {
    /// Fetch one object. Missing objects yield [`ClientError::NotFound`].
    fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Resource, ClientError>;

    /// List objects of a kind, optionally restricted to one namespace
    fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>, ClientError>;

    /// Create or replace an object, returning the stored copy
    fn apply(&self, resource: Resource) -> Result<Resource, ClientError>;

    /// Delete an object. Missing objects yield [`ClientError::NotFound`].
    fn delete(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<(), ClientError>;
}
