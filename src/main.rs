//! blockwatch - chunk change-notification pipeline
//!
//! Demo executable: runs a scripted session against a generated world and
//! prints what the subscribers tracked.

mod config;
mod session;
mod trackers;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use config::AppConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chunk scanner demo session", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to config/blockwatch.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World seed; overrides the config file
    #[arg(long)]
    seed: Option<u64>,

    /// Chunk radius around the origin; overrides the config file
    #[arg(long)]
    radius: Option<i32>,

    /// Number of random block edits; overrides the config file
    #[arg(long)]
    edits: Option<usize>,

    /// Print the report as pretty JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting blockwatch v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };
    if let Some(seed) = args.seed {
        config.demo.seed = seed;
    }
    if let Some(radius) = args.radius {
        config.demo.radius = radius.clamp(0, 16);
    }
    if let Some(edits) = args.edits {
        config.demo.edits = edits;
    }

    let report = session::run(&config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Scanned {} chunks: {} ores ({} seen by the late subscriber)",
        report.chunks_loaded, report.ores_after_load, report.ores_caught_up
    );
    println!(
        "After {} edits: {} ores tracked in {} chunks, {} in the world",
        report.edits_applied, report.ores_after_edits, report.chunks_with_ores, report.ores_expected
    );
    for (id, count) in &report.ore_kinds {
        println!("  block {id:>3}: {count}");
    }
    println!(
        "Unloaded {} chunks: {} ores left; after world change: {}",
        report.chunks_unloaded, report.ores_after_unload, report.ores_after_world_change
    );
    println!("Activity: {:?}", report.activity);
    println!("Metrics: {}", serde_json::to_string(&report.metrics)?);
    Ok(())
}
