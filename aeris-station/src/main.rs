//! aeris-station — demo environmental monitoring station.
//!
//! Wires the aeris core into OS threads with simulated external
//! collaborators (sensor producers, a battery-backed RTC chip, a network
//! time client, a frame source), so the whole subsystem — shared store,
//! time reconciliation, rotating logs, image captures — runs end-to-end on
//! a host machine.

mod sim;
mod station;
mod tasks;

use std::path::PathBuf;

use aeris::StationConfig;
use clap::Parser;

/// aeris-station — environmental monitoring station demo.
#[derive(Parser)]
#[command(name = "aeris-station", version, about)]
struct Cli {
    /// Path to the station data directory (overrides the config file).
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Path to a station config JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulate a dead RTC battery (hardware clock stuck in year 2000).
    #[arg(long)]
    dead_rtc: bool,

    /// Exit after this many seconds; runs forever when omitted.
    #[arg(long)]
    run_for: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = station::run(&config, cli.dead_rtc, cli.run_for) {
        tracing::error!("station failed: {e}");
        std::process::exit(1);
    }

    tracing::info!("station exited cleanly");
}

/// Assembles configuration from the optional file plus CLI overrides.
fn load_config(cli: &Cli) -> aeris::Result<StationConfig> {
    let mut config = match &cli.config {
        Some(path) => StationConfig::load(path)?,
        None => StationConfig::default(),
    };

    if let Some(root) = &cli.data_root {
        config.data_root.clone_from(root);
    }

    config.validate()?;
    Ok(config)
}
