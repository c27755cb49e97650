//! Lumecast daemon - continuous Art-Net transmission service.
//!
//! Boots the output engine from a TOML config file, keeps every configured
//! universe refreshing on the lighting network and shuts down cleanly on
//! ctrl-c.

#![warn(missing_docs)]

mod config;
mod logging_setup;

use std::path::Path;

use anyhow::{Context, Result};
use lumecast_core::UniverseId;
use lumecast_output::OutputEngine;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, trace};

use crate::config::DaemonConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lumecast.toml".to_string());
    let have_config_file = Path::new(&config_path).exists();
    let config = if have_config_file {
        DaemonConfig::load(Path::new(&config_path))
            .with_context(|| format!("Failed to load config from {config_path}"))?
    } else {
        DaemonConfig::default()
    };

    let _log_guard = logging_setup::init(&config.log)?;
    if !have_config_file {
        info!(path = %config_path, "no config file found, using built-in defaults");
    }

    let mut engine = OutputEngine::new(config.engine.clone())?;
    for &raw in &config.universes {
        let universe =
            UniverseId::new(raw).with_context(|| format!("Invalid universe {raw} in config"))?;
        engine.create_universe(universe);
    }
    for node in &config.nodes {
        let added = engine
            .apply_node_config(node)
            .with_context(|| format!("Invalid node entry for {}", node.address))?;
        debug!(address = %node.address, added, "applied node configuration");
    }

    // Relay committed writes into the log; an API layer would fan these out
    // to its live-view subscribers instead.
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    trace!(universe = %event.universe, changes = event.changes.len(), "channels changed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change event relay fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    engine.start().await?;
    info!(
        universes = engine.universe_ids().len(),
        "lumecastd running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    engine.shutdown().await;

    let stats = engine.stats();
    info!(
        ticks = stats.ticks,
        frames = stats.frames_sent,
        errors = stats.send_errors,
        overruns = stats.overruns,
        "final transmit counters"
    );

    Ok(())
}
