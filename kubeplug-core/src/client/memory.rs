//! In-memory Client implementation
//!
//! Objects live in a BTreeMap keyed by kind and object key. Every write bumps
//! a store-wide resource version and is broadcast to watchers.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

use kubeplug_api::{Client, ClientError, ObjectKey, Resource, ResourceKind};

/// Default capacity of the watch channel
const DEFAULT_WATCH_CAPACITY: usize = 1024;

/// What happened to an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchChange {
    Applied,
    Deleted,
}

/// Change notification published on every write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: ResourceKind,
    pub key: ObjectKey,
    pub change: WatchChange,
}

/// Errors from seeding the store from a file
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to read resource file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse resource file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to store resource: {0}")]
    Client(#[from] ClientError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    resources: Vec<Resource>,
}

type StoreKey = (ResourceKind, ObjectKey);

/// In-process object store shared by every controller
pub struct MemoryClient {
    objects: RwLock<BTreeMap<StoreKey, Resource>>,
    /// Last assigned resource version
    version: AtomicU64,
    tx: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WATCH_CAPACITY)
    }

    /// Create a store whose watch channel buffers `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            objects: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            tx,
        }
    }

    /// Receive every change made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.tx.subscribe()
    }

    /// Number of stored objects across all kinds
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply every `[[resources]]` entry in a TOML document
    pub fn seed_from_str(&self, content: &str) -> Result<usize, SeedError> {
        let file: SeedFile = toml::from_str(content)?;
        let count = file.resources.len();
        for resource in file.resources {
            self.apply(resource)?;
        }
        Ok(count)
    }

    /// Apply every `[[resources]]` entry in the TOML file at `path`
    pub fn seed_from_file(&self, path: &Path) -> Result<usize, SeedError> {
        let content = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.seed_from_str(&content)
    }

    fn publish(&self, kind: ResourceKind, key: ObjectKey, change: WatchChange) {
        // No receivers is fine
        let _ = self.tx.send(WatchEvent { kind, key, change });
    }
}

impl Client for MemoryClient {
    fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Resource, ClientError> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind.clone(), key.clone()))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: kind.clone(),
                key: key.clone(),
            })
    }

    fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>, ClientError> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| &r.kind == kind)
            .filter(|r| namespace.is_none_or(|ns| r.key.namespace == ns))
            .cloned()
            .collect())
    }

    fn apply(&self, mut resource: Resource) -> Result<Resource, ClientError> {
        if resource.key.name.is_empty() {
            return Err(ClientError::Invalid("object name must not be empty".into()));
        }
        if resource.key.namespace.is_empty() {
            return Err(ClientError::Invalid("namespace must not be empty".into()));
        }

        let store_key = (resource.kind.clone(), resource.key.clone());
        {
            let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);

            // A non-zero version is a precondition on the stored one
            if resource.resource_version != 0 {
                let current = objects.get(&store_key).map(|r| r.resource_version);
                if current != Some(resource.resource_version) {
                    return Err(ClientError::Conflict {
                        kind: resource.kind.clone(),
                        key: resource.key.clone(),
                        message: format!(
                            "expected version {}, store has {}",
                            resource.resource_version,
                            current.map_or_else(|| "none".to_string(), |v| v.to_string())
                        ),
                    });
                }
            }

            resource.resource_version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
            objects.insert(store_key, resource.clone());
        }

        self.publish(
            resource.kind.clone(),
            resource.key.clone(),
            WatchChange::Applied,
        );
        Ok(resource)
    }

    fn delete(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<(), ClientError> {
        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind.clone(), key.clone()));

        match removed {
            Some(_) => {
                self.publish(kind.clone(), key.clone(), WatchChange::Deleted);
                Ok(())
            }
            None => Err(ClientError::NotFound {
                kind: kind.clone(),
                key: key.clone(),
            }),
        }
    }
}
