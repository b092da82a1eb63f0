//! Controller registry - name-indexed set of live controller instances

use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use kubeplug_api::ResourceKind;

use super::error::RegistryError;
use super::loader::LoadedController;

/// Point-in-time description of a registered controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerInfo {
    pub name: String,
    pub artifact_path: PathBuf,
    /// Kind the controller is bound to, or `None` if binding failed
    pub kind: Option<ResourceKind>,
}

/// Registry of loaded controllers, keyed by exported name.
///
/// Safe to share across threads. A name, once registered, always maps to the
/// same instance for the life of the registry.
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    controllers: RwLock<HashMap<String, Arc<LoadedController>>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a controller under its name.
    ///
    /// Fails with [`RegistryError::DuplicateName`] if the name is taken; the
    /// existing entry is left untouched.
    pub fn register(&self, controller: Arc<LoadedController>) -> Result<(), RegistryError> {
        let mut controllers = self
            .controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match controllers.entry(controller.name().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateName {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(controller);
                Ok(())
            }
        }
    }

    /// Look up a controller by name
    pub fn get(&self, name: &str) -> Result<Arc<LoadedController>, RegistryError> {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Describe every registered controller, sorted by name
    pub fn snapshot(&self) -> Vec<ControllerInfo> {
        let mut infos: Vec<ControllerInfo> = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|c| ControllerInfo {
                name: c.name().to_string(),
                artifact_path: c.artifact_path().to_path_buf(),
                kind: c.bound_kind().cloned(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}
