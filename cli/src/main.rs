//! Diligence CLI - inspect saved analyses and price integration work.
//!
//! Snapshot paths default to `[store] snapshot_path` from the config file.

mod commands;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use diligence_config::DiligenceConfig;
use diligence_cost::{Complexity, DealType, Scenario, ScenarioQuantities};
use diligence_store::{DEFAULT_HASH_LEN, SessionOptions};

#[derive(Parser)]
#[command(name = "diligence")]
#[command(about = "Inspect saved diligence analyses and price integration work")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cost anchors and their tiers
    Anchors,
    /// Price one anchor
    Estimate {
        /// Anchor key, e.g. server_refresh
        anchor: String,
        /// Number of units
        quantity: u32,
        /// Size or complexity tier; the anchor's default when omitted
        tier: Option<String>,
    },
    /// Roll up a saved analysis
    Summary {
        /// Snapshot file
        snapshot: Option<PathBuf>,
    },
    /// List items pending review
    Stale {
        /// Snapshot file
        snapshot: Option<PathBuf>,
    },
    /// Price a deal scenario
    Scenario {
        /// acquisition, merger, carveout or divestiture
        deal_type: DealType,
        industry: String,
        /// simple, moderate, complex or highly_complex
        complexity: Complexity,
        users: u32,
        applications: u32,
        sites: u32,
        servers: u32,
        /// Calibrate the estimate to this external total
        target: Option<f64>,
    },
}

/// `RUST_LOG` first, then the configured filter, then `info`. Logs go to
/// stderr so command output stays clean on stdout.
fn init_tracing(configured: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn session_options(config: &DiligenceConfig) -> Result<SessionOptions> {
    let catalog = config
        .anchor_catalog()
        .context("invalid [[cost.anchors]] in config")?;
    let defaults = SessionOptions::default();
    Ok(SessionOptions {
        id_hash_len: config.id_hash_len().unwrap_or(DEFAULT_HASH_LEN),
        catalog: Arc::new(catalog),
        default_scale_factor: config
            .default_scale_factor()
            .unwrap_or(defaults.default_scale_factor),
        top_drivers: config.top_drivers().unwrap_or(defaults.top_drivers),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file should not stop `diligence` from explaining why.
    let (config, config_error) = match DiligenceConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (DiligenceConfig::default(), Some(err)),
    };
    init_tracing(config.log_filter());
    if let Some(err) = config_error {
        tracing::warn!(path = %err.path().display(), error = %err, "Ignoring config file");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Anchors => {
            let options = session_options(&config)?;
            commands::anchors(&mut out, &options.catalog)?;
        }
        Commands::Estimate {
            anchor,
            quantity,
            tier,
        } => {
            let options = session_options(&config)?;
            let estimator = commands::estimator(Arc::clone(&options.catalog), &options);
            commands::estimate(&mut out, &estimator, &anchor, quantity, tier.as_deref())?;
        }
        Commands::Summary { snapshot } => {
            let options = session_options(&config)?;
            let path = snapshot.unwrap_or_else(|| config.snapshot_path());
            commands::summary(&mut out, &path, &options)?;
        }
        Commands::Stale { snapshot } => {
            let options = session_options(&config)?;
            let path = snapshot.unwrap_or_else(|| config.snapshot_path());
            commands::stale(&mut out, &path, &options)?;
        }
        Commands::Scenario {
            deal_type,
            industry,
            complexity,
            users,
            applications,
            sites,
            servers,
            target,
        } => {
            let scenario = Scenario {
                deal_type,
                industry,
                complexity,
                quantities: ScenarioQuantities {
                    users,
                    applications,
                    sites,
                    servers,
                },
            };
            commands::scenario(&mut out, &config.activity_catalog(), &scenario, target)?;
        }
    }
    out.flush()?;
    Ok(())
}
