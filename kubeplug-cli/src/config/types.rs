use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use kubeplug_api::ResourceKind;

/// Directory scanned for controller artifacts
pub const DEFAULT_PLUGINS_DIR: &str = "./plugins";
/// Address for `/metrics` and `/controllers`
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = ":8080";
/// Address for `/healthz` and `/readyz`
pub const DEFAULT_HEALTH_PROBE_BIND_ADDRESS: &str = ":8081";
/// Seconds a controller constructor may run before the artifact is rejected
pub const DEFAULT_CONSTRUCT_TIMEOUT_SECS: u64 = 30;
/// Concurrent reconciles per controller
pub const DEFAULT_WORKERS: usize = 2;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawHostConfig {
    #[serde(default)]
    pub plugins: RawPluginsConfig,

    #[serde(default)]
    pub manager: RawManagerConfig,

    #[serde(default)]
    pub server: RawServerConfig,
}

/// `[plugins]` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawPluginsConfig {
    pub dir: Option<PathBuf>,

    /// Kind bound when a controller does not declare one, e.g. `v1/ConfigMap`
    pub default_kind: Option<String>,

    /// `0` disables the timeout
    pub construct_timeout_secs: Option<u64>,
}

/// `[manager]` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawManagerConfig {
    pub workers: Option<usize>,

    pub enable_leader_election: Option<bool>,

    /// TOML file of `[[resources]]` loaded into the store at startup
    pub resources: Option<PathBuf>,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawServerConfig {
    /// `host:port`, `:port`, or `0` to disable
    pub metrics_bind_address: Option<String>,

    /// `host:port`, `:port`, or `0` to disable
    pub health_probe_bind_address: Option<String>,
}

/// Final configuration with defaults applied and values validated
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub plugins_dir: PathBuf,
    pub default_kind: ResourceKind,
    pub construct_timeout: Option<Duration>,
    pub workers: usize,
    pub enable_leader_election: bool,
    pub resources: Option<PathBuf>,
    /// `None` when the metrics server is disabled
    pub metrics_bind_address: Option<SocketAddr>,
    /// `None` when the probe server is disabled
    pub health_probe_bind_address: Option<SocketAddr>,
}
