//! pora-node: local flow and mining node.
//!
//! Runs the flow ledger, the mining validator and one local miner in a
//! single process, advancing ledger time epoch by epoch.

mod config;
mod rewards;
mod simulation;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::NodeConfig;
use crate::simulation::Simulation;

fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = NodeConfig::load()?;

    // 2. Initialize tracing; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        epochs = config.simulation.epochs,
        segment_sectors = config.simulation.segment_sectors,
        initial_difficulty = config.mine.initial_difficulty,
        "pora node starting"
    );

    // 3. Run the simulation
    let mut simulation = Simulation::new(config)?;
    let summary = simulation.run()?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("pora node stopped");
    Ok(())
}
