use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{Orchestrator, TickPhase};
use crate::error::{CommanderError, Result};
use crate::types::{StateVector, TxnId};

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunStop {
    /// A collaborator fault aborted the tick at `step`.
    Halted { step: TickPhase },
    /// The shutdown token fired between ticks.
    Cancelled,
    /// The simulation used its full step budget.
    Completed,
}

/// Outcome of `run_continuous`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks_completed: u64,
    pub stop: RunStop,
    pub latest_state: Option<StateVector>,
}

/// Outcome of `run_simulation`.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub requested_steps: u32,
    /// Ticks started, including a failing one.
    pub executed_steps: u32,
    pub succeeded_steps: u32,
    pub stop: RunStop,
    pub last_txn_id: Option<TxnId>,
    pub latest_state: Option<StateVector>,
}

impl SimulationReport {
    pub fn halted_early(&self) -> bool {
        matches!(self.stop, RunStop::Halted { .. })
    }
}

impl Orchestrator {
    /// Tick at `tick_rate_hz` until a tick fails or shutdown is requested.
    ///
    /// Ticks never overlap: after each tick the loop sleeps for whatever is
    /// left of the period. A tick that overruns its period is followed
    /// immediately by the next one, without catch-up.
    pub async fn run_continuous(&mut self) -> RunSummary {
        info!(
            period_ms = self.tick_period.as_millis() as u64,
            "starting real-time orchestration loop"
        );
        let mut completed = 0u64;

        let stop = loop {
            if !self.running {
                break self.halted_stop();
            }
            if self.shutdown.is_cancelled() {
                break RunStop::Cancelled;
            }

            let started = Instant::now();
            if let Err(err) = self.execute_tick().await {
                break RunStop::Halted { step: err.step };
            }
            completed += 1;

            let idle = self.tick_period.saturating_sub(started.elapsed());
            let cancelled = tokio::select! {
                _ = self.shutdown.cancelled() => true,
                _ = tokio::time::sleep(idle) => false,
            };
            if cancelled {
                break RunStop::Cancelled;
            }
        };

        info!(ticks = completed, stop = ?stop, "orchestration loop stopped");
        RunSummary {
            ticks_completed: completed,
            stop,
            latest_state: self.latest_state.clone(),
        }
    }

    /// Run exactly `steps` ticks back to back, stopping early on a fault or
    /// shutdown.
    pub async fn run_simulation(&mut self, steps: u32) -> Result<SimulationReport> {
        if steps == 0 {
            return Err(CommanderError::InvalidArgument(
                "simulation steps must be greater than 0".into(),
            ));
        }

        let mut report = SimulationReport {
            requested_steps: steps,
            executed_steps: 0,
            succeeded_steps: 0,
            stop: RunStop::Completed,
            last_txn_id: None,
            latest_state: None,
        };

        for step in 1..=steps {
            if !self.running {
                report.stop = self.halted_stop();
                break;
            }
            if self.shutdown.is_cancelled() {
                report.stop = RunStop::Cancelled;
                break;
            }

            info!("simulation step {step}/{steps}");
            report.executed_steps = step;
            match self.execute_tick().await {
                Ok(txn_id) => {
                    report.succeeded_steps += 1;
                    if txn_id.is_some() {
                        report.last_txn_id = txn_id;
                    }
                }
                Err(err) => {
                    warn!(step, "simulation halted early due to error");
                    report.stop = RunStop::Halted { step: err.step };
                    break;
                }
            }
        }

        report.latest_state = self.latest_state.clone();
        Ok(report)
    }

    fn halted_stop(&self) -> RunStop {
        RunStop::Halted {
            step: self.halted_at.unwrap_or(self.phase),
        }
    }

    /// Probe the state source. Never runs the tick pipeline.
    pub async fn check_health(&self) -> bool {
        let healthy = self.state_source.health_check().await;
        info!(
            "state source health check: {}",
            if healthy { "OK" } else { "FAILED" }
        );
        healthy
    }
}
