use super::types::{
    DEFAULT_CONSTRUCT_TIMEOUT_SECS, DEFAULT_HEALTH_PROBE_BIND_ADDRESS,
    DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_PLUGINS_DIR, DEFAULT_WORKERS, HostConfig, RawHostConfig,
    RawManagerConfig, RawPluginsConfig, RawServerConfig,
};
use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kubeplug_api::ResourceKind;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration: user config, then `explicit`, then `flags`
    pub fn load(explicit: Option<&Path>, flags: RawHostConfig) -> Result<HostConfig> {
        let user_path = Self::user_config_path();
        Self::load_layers(user_path.as_deref(), explicit, flags)
    }

    /// Layering without the platform lookup.
    ///
    /// A missing user config is skipped; a missing explicit config is an error.
    pub fn load_layers(
        user: Option<&Path>,
        explicit: Option<&Path>,
        flags: RawHostConfig,
    ) -> Result<HostConfig> {
        let mut raw = RawHostConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: --config file
        if let Some(path) = explicit {
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        // Layer 3: command-line flags
        raw = Self::merge_raw(raw, flags);

        Self::finalize(raw)
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kubeplug").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn read_raw(path: &Path) -> Result<RawHostConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawHostConfig, overlay: RawHostConfig) -> RawHostConfig {
        RawHostConfig {
            plugins: RawPluginsConfig {
                dir: overlay.plugins.dir.or(base.plugins.dir),
                default_kind: overlay.plugins.default_kind.or(base.plugins.default_kind),
                construct_timeout_secs: overlay
                    .plugins
                    .construct_timeout_secs
                    .or(base.plugins.construct_timeout_secs),
            },
            manager: RawManagerConfig {
                workers: overlay.manager.workers.or(base.manager.workers),
                enable_leader_election: overlay
                    .manager
                    .enable_leader_election
                    .or(base.manager.enable_leader_election),
                resources: overlay.manager.resources.or(base.manager.resources),
            },
            server: RawServerConfig {
                metrics_bind_address: overlay
                    .server
                    .metrics_bind_address
                    .or(base.server.metrics_bind_address),
                health_probe_bind_address: overlay
                    .server
                    .health_probe_bind_address
                    .or(base.server.health_probe_bind_address),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawHostConfig) -> Result<HostConfig> {
        let default_kind = match raw.plugins.default_kind {
            Some(kind) => kind
                .parse::<ResourceKind>()
                .map_err(|e| anyhow!("Invalid default_kind: {e}"))?,
            None => ResourceKind::config_map(),
        };

        let construct_timeout = match raw
            .plugins
            .construct_timeout_secs
            .unwrap_or(DEFAULT_CONSTRUCT_TIMEOUT_SECS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let workers = raw.manager.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            bail!("workers must be at least 1");
        }

        let metrics_bind_address = parse_bind_address(
            raw.server
                .metrics_bind_address
                .as_deref()
                .unwrap_or(DEFAULT_METRICS_BIND_ADDRESS),
        )
        .context("Invalid metrics_bind_address")?;
        let health_probe_bind_address = parse_bind_address(
            raw.server
                .health_probe_bind_address
                .as_deref()
                .unwrap_or(DEFAULT_HEALTH_PROBE_BIND_ADDRESS),
        )
        .context("Invalid health_probe_bind_address")?;

        Ok(HostConfig {
            plugins_dir: raw
                .plugins
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PLUGINS_DIR)),
            default_kind,
            construct_timeout,
            workers,
            enable_leader_election: raw.manager.enable_leader_election.unwrap_or(false),
            resources: raw.manager.resources,
            metrics_bind_address,
            health_probe_bind_address,
        })
    }
}

/// Parse a listen address.
///
/// Accepts `host:port`, a bare `:port` (all interfaces), or `0` meaning the
/// server is disabled.
pub fn parse_bind_address(value: &str) -> Result<Option<SocketAddr>> {
    let value = value.trim();
    if value == "0" {
        return Ok(None);
    }

    let full = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => value.to_string(),
    };
    full.parse::<SocketAddr>()
        .map(Some)
        .with_context(|| format!("'{value}' is not host:port or :port"))
}
