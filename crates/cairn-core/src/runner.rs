//! Tick loop runner.
//!
//! [`run_simulation`] drives [`Engine::advance_one_tick`] until the
//! configured tick bound is reached, sleeping between ticks when a tick
//! interval is configured. The kernel itself never suspends; the runner is
//! the only async piece, so the binary can race it against a shutdown
//! signal.

use tracing::info;

use crate::config::SimulationBounds;
use crate::engine::{Engine, TickSummary};
use crate::error::KernelError;

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed fatally.
    #[error("tick {tick} failed: {source}")]
    Tick {
        /// The tick number that was being executed.
        tick: u64,
        /// The underlying kernel error.
        source: KernelError,
    },
}

/// Why the simulation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed by this run.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
pub trait TickCallback {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, engine: &Engine);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _engine: &Engine) {}
}

/// Run ticks until `bounds.max_ticks` ticks have completed in this run.
///
/// With `max_ticks == 0` the loop only ends on error, or when the caller
/// drops the future.
pub async fn run_simulation(
    engine: &mut Engine,
    bounds: SimulationBounds,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = bounds.max_ticks,
        tick_interval_ms = bounds.tick_interval_ms,
        zones = engine.registry().zone_names().len(),
        "Simulation starting"
    );

    loop {
        // --- Check tick limit ---
        if bounds.max_ticks > 0 && total_ticks >= bounds.max_ticks {
            info!(total_ticks, max_ticks = bounds.max_ticks, "Tick limit reached");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxTicksReached,
                final_summary: last_summary,
                total_ticks,
            });
        }

        // --- Execute tick ---
        let summary = engine.advance_one_tick().map_err(|source| RunnerError::Tick {
            tick: engine.ticks().unwrap_or_default().saturating_add(1),
            source,
        })?;
        total_ticks = total_ticks.saturating_add(1);

        // --- Notify callback ---
        callback.on_tick(&summary, engine);
        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        if bounds.tick_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(bounds.tick_interval_ms)).await;
        }
    }
}

/// Log the end of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );
}
