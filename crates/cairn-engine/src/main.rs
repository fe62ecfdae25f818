//! Cairn engine binary.
//!
//! Wires the kernel, the cave world and the tick runner together. It loads
//! configuration, builds or restores the world, runs the tick loop until the
//! tick bound is reached or the process is interrupted, and optionally dumps
//! the final structured state.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `cairn-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Restore the world from `world.state_file`, or create the starting world
//! 4. Subscribe the activity log
//! 5. Run the simulation loop, racing it against Ctrl-C
//! 6. Write `world.dump_file` and log the result

mod activity;
mod error;

use std::path::Path;

use cairn_core::config::KernelConfig;
use cairn_core::{Engine, codec, runner};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::activity::CaveReport;
use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const CONFIG_PATH: &str = "cairn-config.yaml";

/// Application entry point for the Cairn engine.
///
/// The kernel is single-threaded, so the runtime is too.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        world_name = config.world.name,
        max_ticks = config.simulation.max_ticks,
        tick_interval_ms = config.simulation.tick_interval_ms,
        "cairn-engine starting"
    );

    // 3. Build or restore the world.
    let mut engine = load_world(&config)?;
    info!(
        items = engine.registry().len(),
        zones = engine.registry().zone_names().len(),
        ticks = engine.ticks()?,
        "World ready"
    );

    // 4. Activity log.
    activity::subscribe_activity_log(&mut engine);
    let mut report = CaveReport::default();

    // 5. Run until the bound is reached or the operator interrupts.
    let outcome = tokio::select! {
        result = runner::run_simulation(&mut engine, config.simulation, &mut report) => {
            Some(result.map_err(EngineError::from)?)
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received, stopping tick loop");
            None
        }
    };

    // 6. Dump state and log results.
    dump_world(&config, &engine)?;
    if let Some(result) = &outcome {
        runner::log_simulation_end(result);
    }

    info!(
        ticks = engine.ticks()?,
        ticks_reported = report.ticks_seen(),
        "cairn-engine shutdown complete"
    );

    Ok(())
}

/// Load the run configuration from `cairn-config.yaml`.
///
/// Environment overrides apply even when the file is absent.
fn load_config() -> Result<KernelConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(KernelConfig::from_file(config_path)?)
    } else {
        let mut config = KernelConfig::default();
        config.world.apply_env_overrides();
        Ok(config)
    }
}

/// Restore the world from the configured state file, or create the
/// starting world when none is configured.
fn load_world(config: &KernelConfig) -> Result<Engine, EngineError> {
    let Some(path) = &config.world.state_file else {
        info!("No state file configured, creating starting world");
        return Ok(cairn_world::create_starting_world()?);
    };
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::StateFile {
        path: path.clone(),
        source,
    })?;
    let state = codec::from_json(&text)?;
    info!(path = %path, items = state.len(), "Restoring world from state file");
    Ok(cairn_world::load_world(state)?)
}

/// Write the structured state to the configured dump file, if any.
fn dump_world(config: &KernelConfig, engine: &Engine) -> Result<(), EngineError> {
    let Some(path) = &config.world.dump_file else {
        return Ok(());
    };
    let text = codec::to_json(&engine.structured_state())?;
    std::fs::write(path, text).map_err(|source| EngineError::StateFile {
        path: path.clone(),
        source,
    })?;
    info!(path = %path, items = engine.registry().len(), "World state dumped");
    Ok(())
}
