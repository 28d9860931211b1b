//! faultline — outage timeline builder CLI
//!
//! Folds captured outage-page snapshots into a durable event timeline
//! (`outages.json`), resuming from the checkpoint embedded in the artifact.
//!
//! # Subcommands
//! - `process` — fold unprocessed snapshots into the output artifact
//! - `status`  — show checkpoint and event counts from the artifact
//! - `migrate` — move flat snapshot files into `YYYY-MM/` subdirectories

use std::path::Path;

use clap::{Parser, Subcommand};
use regex::Regex;
use tracing_subscriber::{fmt, EnvFilter};

use faultline_core::{
    reconcile, FaultlineConfig, FsSnapshotStore, JsonArtifactStore, Snapshot, SnapshotStore,
    StateStore,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "faultline",
    version,
    about = "Faultline — builds an outage-event timeline from periodic page snapshots"
)]
struct Cli {
    /// Configuration file (TOML); defaults apply when the file is absent
    #[arg(short, long, default_value = "faultline.toml")]
    config: String,

    /// Snapshot history directory (overrides the config file)
    #[arg(long)]
    history_dir: Option<String>,

    /// Output artifact path (overrides the config file)
    #[arg(long)]
    artifact: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fold all unprocessed snapshots into the output artifact
    Process,

    /// Show the artifact's checkpoint and event counts
    Status,

    /// Move flat snapshot files into YYYY-MM subdirectories (one-time)
    Migrate,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = load_config(&cli);

    match cli.command {
        Commands::Process => run_process(&config),
        Commands::Status => run_status(&config),
        Commands::Migrate => run_migrate(&config),
    }
}

/// Load the config file if it exists, apply CLI overrides, expand `~`.
fn load_config(cli: &Cli) -> FaultlineConfig {
    let mut config = if Path::new(&cli.config).exists() {
        match FaultlineConfig::load(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", cli.config, e);
                std::process::exit(1);
            }
        }
    } else {
        FaultlineConfig::default()
    };

    if let Some(history_dir) = &cli.history_dir {
        config.store.history_dir = history_dir.clone();
    }
    if let Some(artifact) = &cli.artifact {
        config.output.artifact_path = artifact.clone();
    }
    config.store.history_dir = shellexpand::tilde(&config.store.history_dir).into_owned();
    config.output.artifact_path = shellexpand::tilde(&config.output.artifact_path).into_owned();
    config
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_process(config: &FaultlineConfig) -> anyhow::Result<()> {
    let store = FsSnapshotStore::open(&config.store.history_dir)?;
    let state = JsonArtifactStore::new(&config.output.artifact_path);

    let (checkpoint, prior_events) = state.load();
    let outcome = reconcile(
        checkpoint.as_ref(),
        prior_events,
        &store,
        config.source.activity_signal,
    )?;
    state.save(outcome.checkpoint.as_ref(), &outcome.events)?;

    let ongoing = outcome.events.values().filter(|e| e.is_ongoing()).count();
    println!(
        "Processed {} snapshots: {} events opened, {} closed, {} ongoing, {} tracked in total",
        outcome.report.snapshots_processed,
        outcome.report.events_opened,
        outcome.report.events_closed,
        ongoing,
        outcome.events.len()
    );
    Ok(())
}

fn run_status(config: &FaultlineConfig) -> anyhow::Result<()> {
    let state = JsonArtifactStore::new(&config.output.artifact_path);
    let (checkpoint, events) = state.load();

    match checkpoint {
        Some(key) => println!("Checkpoint: {key}"),
        None => println!("Checkpoint: none (next run processes all history)"),
    }
    let ongoing = events.values().filter(|e| e.is_ongoing()).count();
    println!("Events: {} total, {} ongoing", events.len(), ongoing);

    // Latest capture's aggregate headcount, when the store has one.
    let store = FsSnapshotStore::open(&config.store.history_dir)?;
    let keys = store.keys()?;
    if let Some(key) = keys.last() {
        let snapshot = Snapshot::parse(key, store.load(key)?, config.source.activity_signal)?;
        println!("Latest capture: {key}");
        if let Some(customers_off) = snapshot.customers_off {
            println!("Customers currently off: {customers_off}");
        }
    }
    Ok(())
}

/// One-time maintenance: early captures wrote snapshots flat into the
/// history root; later ones bucket them by month. Moves every root-level
/// file whose name starts with a `YYYY-MM-DD` stamp into its `YYYY-MM/`
/// bucket. Files already inside subdirectories are left alone.
fn run_migrate(config: &FaultlineConfig) -> anyhow::Result<()> {
    let root = Path::new(&config.store.history_dir);
    if !root.exists() {
        println!("Directory '{}' not found, nothing to migrate", root.display());
        return Ok(());
    }

    let pattern = Regex::new(r"^(\d{4}-\d{2})-\d{2}T.*")?;
    let mut migrated = 0usize;

    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(captures) = pattern.captures(name) else {
            continue;
        };

        let bucket = root.join(&captures[1]);
        std::fs::create_dir_all(&bucket)?;
        let destination = bucket.join(name);
        tracing::info!("Moving {} to {}", path.display(), destination.display());
        std::fs::rename(&path, &destination)?;
        migrated += 1;
    }

    println!("Migrated {} files in '{}'", migrated, root.display());
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
