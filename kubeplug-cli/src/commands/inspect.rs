//! `kubeplug inspect` - dry-run the loading pipeline
//!
//! Loads and binds every artifact against a manager that is never started,
//! then prints what made it into the registry and what failed.

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use kubeplug_core::{ControllerInfo, LoadReport, Manager, ManagerConfig, MemoryClient};

use super::{PluginArgs, load_plugins};
use crate::config::ConfigLoader;

/// Arguments for the inspect command
#[derive(Debug, Default, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub plugins: PluginArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero if any artifact failed
    #[arg(long)]
    pub strict: bool,
}

/// Machine-readable inspect result
#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub controllers: Vec<ControllerInfo>,
    pub failures: Vec<FailureRow>,
}

#[derive(Debug, Serialize)]
pub struct FailureRow {
    pub path: PathBuf,
    pub failure: &'static str,
    pub error: String,
}

impl InspectOutput {
    fn new(controllers: Vec<ControllerInfo>, report: &LoadReport) -> Self {
        let failures = report
            .failures
            .iter()
            .map(|f| FailureRow {
                path: f.path.clone(),
                failure: f.kind(),
                error: f.error.to_string(),
            })
            .collect();
        Self {
            controllers,
            failures,
        }
    }

    fn write_text(&self, out: &mut impl Write) -> std::io::Result<()> {
        if self.controllers.is_empty() {
            writeln!(out, "No controllers loaded")?;
        } else {
            writeln!(out, "Loaded controllers:")?;
            for c in &self.controllers {
                let kind = c
                    .kind
                    .as_ref()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "(unbound)".to_string());
                writeln!(
                    out,
                    "  {:<28} {:<20} {}",
                    c.name,
                    kind,
                    c.artifact_path.display()
                )?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(out)?;
            writeln!(out, "Failed artifacts:")?;
            for f in &self.failures {
                writeln!(out, "  {} [{}]", f.path.display(), f.failure)?;
                writeln!(out, "    {}", f.error)?;
            }
        }
        Ok(())
    }
}

/// Run the inspect command
pub fn run(args: InspectArgs) -> Result<()> {
    let config = ConfigLoader::load(args.plugins.config.as_deref(), args.plugins.overlay())?;

    let manager = Manager::new(Arc::new(MemoryClient::new()), ManagerConfig::default());
    let (host, report) = load_plugins(&config, &manager)?;
    let output = InspectOutput::new(host.registry().snapshot(), &report);

    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &output)?;
        writeln!(stdout)?;
    } else {
        output.write_text(&mut stdout)?;
    }

    if args.strict && !output.failures.is_empty() {
        bail!("{} artifact(s) failed to load", output.failures.len());
    }
    Ok(())
}
