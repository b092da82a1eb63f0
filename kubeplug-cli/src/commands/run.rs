//! `kubeplug run` - load controllers and drive them until signalled
//!
//! Startup order:
//! 1. Resolve configuration
//! 2. Seed the in-memory store (optional)
//! 3. Load, register and bind every controller in the plugin directory
//! 4. Start the probe and metrics servers, then the manager
//! 5. On Ctrl-C or SIGTERM, cancel everything and wait for in-flight work

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kubeplug_core::{
    LoadReport, Manager, ManagerConfig, MemoryClient, PluginHost, TracingRecorder,
};

use super::{PluginArgs, load_plugins};
use crate::config::{ConfigLoader, HostConfig, RawHostConfig, RawManagerConfig, RawServerConfig};
use crate::server::{AppState, bind, metrics_router, probe_router, serve};
use crate::signal::shutdown_signal;

/// Arguments for the run command
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub plugins: PluginArgs,

    /// Metrics endpoint address, `:port` or `0` to disable [default: :8080]
    #[arg(long, value_name = "ADDR")]
    pub metrics_bind_address: Option<String>,

    /// Probe endpoint address, `:port` or `0` to disable [default: :8081]
    #[arg(long, value_name = "ADDR")]
    pub health_probe_bind_address: Option<String>,

    /// Request leader election for the manager
    #[arg(long)]
    pub enable_leader_election: bool,

    /// Concurrent reconciles per controller [default: 2]
    #[arg(long)]
    pub workers: Option<usize>,

    /// TOML file of resources to load into the store at startup
    #[arg(long, value_name = "FILE")]
    pub resources: Option<PathBuf>,
}

impl RunArgs {
    fn overlay(&self) -> RawHostConfig {
        RawHostConfig {
            manager: RawManagerConfig {
                workers: self.workers,
                // An absent switch must not override a file that enables it
                enable_leader_election: self.enable_leader_election.then_some(true),
                resources: self.resources.clone(),
            },
            server: RawServerConfig {
                metrics_bind_address: self.metrics_bind_address.clone(),
                health_probe_bind_address: self.health_probe_bind_address.clone(),
            },
            ..self.plugins.overlay()
        }
    }
}

/// Run the run command
pub async fn run(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load(args.plugins.config.as_deref(), args.overlay())?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signal_token.cancel();
    });

    run_with(config, shutdown).await
}

/// Everything after configuration, stopping when `shutdown` is cancelled
pub async fn run_with(config: HostConfig, shutdown: CancellationToken) -> Result<()> {
    // Claim the ports before loading anything so a taken address fails fast
    let probe_listener = match config.health_probe_bind_address {
        Some(addr) => Some(bind("probe", addr).await?),
        None => None,
    };
    let metrics_listener = match config.metrics_bind_address {
        Some(addr) => Some(bind("metrics", addr).await?),
        None => None,
    };

    let client = Arc::new(MemoryClient::new());
    if let Some(path) = &config.resources {
        let count = client
            .seed_from_file(path)
            .with_context(|| format!("Failed to seed resources from {}", path.display()))?;
        info!(path = %path.display(), count, "Seeded resources");
    }

    let manager = Arc::new(
        Manager::new(
            Arc::clone(&client),
            ManagerConfig {
                workers: config.workers,
                ..ManagerConfig::default()
            },
        )
        .with_recorder(Arc::new(TracingRecorder)),
    );

    let (host, report) = load_plugins_blocking(&config, &manager).await?;
    if !report.is_clean() {
        warn!(
            failed = report.failures.len(),
            "Some controllers failed to load; continuing with the rest"
        );
    }

    if config.enable_leader_election {
        info!("Leader election requested; this process runs as the single leader");
    }

    let state = AppState {
        manager: Arc::clone(&manager),
        registry: Arc::clone(host.registry()),
    };

    let mut servers = JoinSet::new();
    if let Some(listener) = probe_listener {
        servers.spawn(serve(
            "probe",
            listener,
            probe_router(state.clone()),
            shutdown.clone(),
        ));
    }
    if let Some(listener) = metrics_listener {
        servers.spawn(serve(
            "metrics",
            listener,
            metrics_router(state),
            shutdown.clone(),
        ));
    }

    info!(
        controllers = host.registry().len(),
        workers = config.workers,
        "Starting manager"
    );
    let mut engine = {
        let manager = Arc::clone(&manager);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { manager.start(shutdown).await })
    };

    // A server that dies takes the whole host down with it
    let mut server_error = None;
    let manager_result = loop {
        tokio::select! {
            joined = &mut engine => break joined.context("Manager task panicked")?,
            Some(joined) = servers.join_next() => {
                if let Err(e) = joined.context("Server task panicked").and_then(|r| r) {
                    error!(error = %format!("{e:#}"), "Server stopped; shutting down");
                    server_error.get_or_insert(e);
                    shutdown.cancel();
                }
            }
        }
    };

    shutdown.cancel();
    while let Some(joined) = servers.join_next().await {
        if let Err(e) = joined.context("Server task panicked").and_then(|r| r) {
            server_error.get_or_insert(e);
        }
    }
    if let Some(e) = server_error {
        return Err(e);
    }
    manager_result?;

    info!("Shutdown complete");
    Ok(())
}

/// Load plugins on the blocking pool; constructors may take a while
async fn load_plugins_blocking(
    config: &HostConfig,
    manager: &Arc<Manager>,
) -> Result<(PluginHost, LoadReport)> {
    let config = config.clone();
    let manager = Arc::clone(manager);
    tokio::task::spawn_blocking(move || load_plugins(&config, &manager))
        .await
        .context("Plugin loading panicked")?
}
