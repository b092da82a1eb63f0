//! Resource model shared by the host and controllers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A resource type, e.g. `v1/ConfigMap` or `apps/v1/Deployment`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKind {
    /// API group and version (`v1`, `apps/v1`)
    pub api_version: String,
    /// Kind name (`ConfigMap`)
    pub kind: String,
}

impl ResourceKind {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Core `v1/ConfigMap`
    pub fn config_map() -> Self {
        Self::new("v1", "ConfigMap")
    }

    /// Core `v1/Secret`
    pub fn secret() -> Self {
        Self::new("v1", "Secret")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Parses `<api_version>/<Kind>`; the kind is everything after the last `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (api_version, kind) = s
            .rsplit_once('/')
            .ok_or_else(|| format!("expected <api_version>/<Kind>, got '{}'", s))?;
        if api_version.is_empty() || kind.is_empty() {
            return Err(format!("expected <api_version>/<Kind>, got '{}'", s));
        }
        Ok(Self::new(api_version, kind))
    }
}

/// Namespaced object name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A stored object of some [`ResourceKind`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(flatten)]
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub key: ObjectKey,
    /// Assigned by the store on every write
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, key: ObjectKey) -> Self {
        Self {
            kind,
            key,
            resource_version: 0,
            labels: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// Builder: add a data entry
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Builder: add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A request to bring one object to its desired state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileRequest {
    pub key: ObjectKey,
}

impl ReconcileRequest {
    pub fn new(key: ObjectKey) -> Self {
        Self { key }
    }
}

/// What the engine should do after a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Action {
    requeue_after: Option<Duration>,
}

impl Action {
    /// Do nothing until the object changes again
    pub fn await_change() -> Self {
        Self {
            requeue_after: None,
        }
    }

    /// Reconcile the same object again after `duration`
    pub fn requeue(duration: Duration) -> Self {
        Self {
            requeue_after: Some(duration),
        }
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        self.requeue_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_display_and_parse() {
        let kind: ResourceKind = "apps/v1/Deployment".parse().unwrap();
        assert_eq!(kind.api_version, "apps/v1");
        assert_eq!(kind.kind, "Deployment");
        assert_eq!(kind.to_string(), "apps/v1/Deployment");

        let core: ResourceKind = "v1/ConfigMap".parse().unwrap();
        assert_eq!(core, ResourceKind::config_map());
    }

    #[test]
    fn test_resource_kind_parse_rejects_garbage() {
        assert!("ConfigMap".parse::<ResourceKind>().is_err());
        assert!("v1/".parse::<ResourceKind>().is_err());
        assert!("/Secret".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("kube-system", "dns").to_string(), "kube-system/dns");
    }

    #[test]
    fn test_resource_toml_flattened_fields() {
        let toml_str = r#"
api_version = "v1"
kind = "ConfigMap"
name = "settings"

[data]
mode = "fast"
"#;
        let resource: Resource = toml::from_str(toml_str).unwrap();
        assert_eq!(resource.kind, ResourceKind::config_map());
        assert_eq!(resource.key, ObjectKey::new("default", "settings"));
        assert_eq!(resource.data.get("mode").map(String::as_str), Some("fast"));
        assert_eq!(resource.resource_version, 0);
    }

    #[test]
    fn test_action_variants() {
        assert_eq!(Action::await_change().requeue_after(), None);
        assert_eq!(Action::default(), Action::await_change());
        assert_eq!(
            Action::requeue(Duration::from_secs(10)).requeue_after(),
            Some(Duration::from_secs(10))
        );
    }
}
