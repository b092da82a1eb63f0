pub mod inspect;
pub mod run;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use kubeplug_core::{LoadReport, LoaderConfig, Manager, PluginHost, PluginLoader, Registrar};

use crate::config::{HostConfig, RawHostConfig, RawPluginsConfig};

/// Plugin discovery flags shared by every command
#[derive(Debug, Default, Args)]
pub struct PluginArgs {
    /// Config file layered over the user config
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory scanned for controller artifacts [default: ./plugins]
    #[arg(long, value_name = "DIR")]
    pub plugins_dir: Option<PathBuf>,

    /// Kind bound when a controller declares none [default: v1/ConfigMap]
    #[arg(long, value_name = "KIND")]
    pub default_kind: Option<String>,

    /// Seconds a constructor may run, 0 for no limit [default: 30]
    #[arg(long, value_name = "SECS")]
    pub construct_timeout_secs: Option<u64>,
}

impl PluginArgs {
    /// Flags as the top config layer
    pub fn overlay(&self) -> RawHostConfig {
        RawHostConfig {
            plugins: RawPluginsConfig {
                dir: self.plugins_dir.clone(),
                default_kind: self.default_kind.clone(),
                construct_timeout_secs: self.construct_timeout_secs,
            },
            ..Default::default()
        }
    }
}

/// Build a plugin host for `config` and load the plugin directory into
/// `manager`. Only a missing directory is an error.
pub fn load_plugins(config: &HostConfig, manager: &Manager) -> Result<(PluginHost, LoadReport)> {
    let loader = PluginLoader::new(LoaderConfig {
        construct_timeout: config.construct_timeout,
        ..LoaderConfig::default()
    });
    let registrar = Registrar::new(manager.client().clone(), config.default_kind.clone());
    let host = PluginHost::new(loader, registrar);

    let report = host
        .load_directory(&config.plugins_dir, manager)
        .with_context(|| format!("Cannot load controllers from {}", config.plugins_dir.display()))?;
    Ok((host, report))
}
