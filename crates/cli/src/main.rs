//! Fleet recommendation CLI
//!
//! Runs the recommendation engine against a cluster snapshot and prints
//! per-NodePool recommendations, cost summaries and individual price or
//! candidate lookups.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{costs, inspect, recommend};
use fleet_lib::{Architecture, EngineMetrics, PricingClass};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fleet recommendation CLI
#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(author, version, long_about = None)]
#[command(about = "Cost-optimal fleet recommendations for Kubernetes NodePools")]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, env = "FLEET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pricing catalog base URL; overrides the configuration file
    #[arg(long, env = "FLEET_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Print Prometheus metrics after the command finishes
    #[arg(long)]
    pub emit_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recommend a fleet for every NodePool in a snapshot
    Recommend {
        /// Cluster snapshot (JSON)
        #[arg(long, short)]
        snapshot: PathBuf,

        /// Only show this NodePool
        #[arg(long, short)]
        nodepool: Option<String>,

        /// Print progress while pools are analysed
        #[arg(long)]
        progress: bool,
    },

    /// Show current and recommended fleet cost
    Costs {
        /// Cluster snapshot (JSON)
        #[arg(long, short)]
        snapshot: PathBuf,
    },

    /// Resolve the hourly price of an instance type
    Price {
        /// Instance type, e.g. m6i.xlarge
        instance_type: String,

        /// Pricing class (on-demand, spot)
        #[arg(long, default_value = "on-demand")]
        class: PricingClass,
    },

    /// List candidate instance types for a capacity requirement
    Candidates {
        /// Required CPU in cores
        #[arg(long)]
        cpu: f64,

        /// Required memory in GiB
        #[arg(long)]
        memory: f64,

        /// Architecture (amd64, arm64)
        #[arg(long, default_value = "amd64")]
        arch: Architecture,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let engine_config =
        config::load_engine_config(cli.config.as_deref(), cli.catalog_url.as_deref())
            .context("Failed to load engine configuration")?;

    match cli.command {
        Commands::Recommend {
            snapshot,
            nodepool,
            progress,
        } => {
            let nodepool = nodepool.as_deref();
            recommend::run(&engine_config, &snapshot, nodepool, progress, cli.format).await?;
        }
        Commands::Costs { snapshot } => {
            costs::show_costs(&engine_config, &snapshot, cli.format).await?;
        }
        Commands::Price {
            instance_type,
            class,
        } => {
            inspect::show_price(&engine_config, &instance_type, class, cli.format).await?;
        }
        Commands::Candidates { cpu, memory, arch } => {
            inspect::show_candidates(&engine_config, arch, cpu, memory, cli.format).await?;
        }
    }

    if cli.emit_metrics {
        print!("{}", EngineMetrics::new().gather_text());
    }

    Ok(())
}
