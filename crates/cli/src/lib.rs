//! EDR Pipeline CLI
//!
//! Wires settings, logging, metrics and the SQLite store to:
//! - fixture generation and bulk deletion
//! - timed accident detection with a console or JSON report

mod commands;
mod settings;

pub use commands::{
    delete_range, delete_vehicles, find_accidents, generate, AccidentsArgs, AccidentsOutput,
    GenerateArgs,
};
pub use settings::{environment, Settings, DEFAULT_CONFIG_FILE};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use storage::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// EDR accident pipeline
#[derive(Parser, Debug)]
#[command(name = "edr-pipeline", version, about = "EDR accident detection pipeline")]
pub struct Cli {
    /// Settings file (TOML); `edr.toml` is read if present when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write synthetic events and incidents
    Generate(GenerateArgs),
    /// Delete all events and incidents of the given vehicles
    Delete {
        #[arg(required = true)]
        vehicle_ids: Vec<String>,
    },
    /// Delete vehicles `start..end` (end exclusive)
    DeleteRange {
        #[arg(long)]
        start: u32,
        #[arg(long)]
        end: u32,
    },
    /// Detect accidents for the given vehicles
    Accidents(AccidentsArgs),
}

/// Install the global `tracing` subscriber
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Serve Prometheus metrics on `addr`
pub fn install_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

/// Run one command against the configured store
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings.log_level, settings.log_json)?;

    info!("=== EDR Accident Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = settings.metrics_listen {
        install_metrics(addr)?;
    }

    let store = Arc::new(
        SqliteStore::connect(&settings.store)
            .await
            .context("Failed to open store")?,
    );
    let result = dispatch(cli.command, store.clone(), &settings).await;
    store.close().await;
    result
}

async fn dispatch(command: Command, store: Arc<SqliteStore>, settings: &Settings) -> Result<()> {
    match command {
        Command::Generate(args) => {
            let (summary, timing) = generate(store, &args).await?;
            println!(
                "Generated {} events and {} incidents for {} vehicles in {:.3}s",
                summary.events, summary.incidents, summary.vehicles, timing.total_secs
            );
        }
        Command::Delete { vehicle_ids } => {
            let summary = delete_vehicles(store.as_ref(), &vehicle_ids).await?;
            println!(
                "Deleted {} events and {} incidents for {} vehicles",
                summary.events, summary.incidents, summary.vehicles
            );
        }
        Command::DeleteRange { start, end } => {
            let summary = delete_range(store.as_ref(), start, end).await?;
            println!(
                "Deleted {} events and {} incidents for {} vehicles",
                summary.events, summary.incidents, summary.vehicles
            );
        }
        Command::Accidents(args) => {
            let output = find_accidents(store, &settings.detection, &args).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", output.report);
            }
        }
    }
    Ok(())
}
