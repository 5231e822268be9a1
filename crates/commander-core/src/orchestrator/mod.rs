//! Tick-rate orchestrator.
//!
//! Each tick runs `measure → lookup → decide → combine → commit` strictly in
//! sequence. A tick either completes and replaces the latest state vector, or
//! aborts at the first collaborator fault and halts the run. The run-mode
//! drivers in `modes` decide how often ticks happen.

mod combine;
mod modes;
mod phase;


pub use combine::combine;
pub use modes::{RunStop, RunSummary, SimulationReport};
pub use phase::TickPhase;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collaborator::{DecisionEngine, Ledger, StateSource};
use crate::config::OrchestratorConfig;
use crate::error::{Result, TickError};
use crate::types::{StateVector, TimestampSelector, TxnId};

/// The latest committed state, as published to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Ordinal of the tick that produced this state.
    pub seq: u64,
    pub vector: StateVector,
    /// `None` when the ledger skipped the commit (offline).
    pub txn_id: Option<TxnId>,
    pub committed_at: DateTime<Utc>,
}

pub struct Orchestrator {
    tick_period: Duration,
    state_source: Box<dyn StateSource>,
    ledger: Box<dyn Ledger>,
    engine: Box<dyn DecisionEngine>,
    latest_state: Option<StateVector>,
    running: bool,
    phase: TickPhase,
    halted_at: Option<TickPhase>,
    ticks: u64,
    snapshots: watch::Sender<Option<StateSnapshot>>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Build an orchestrator over the given collaborators.
    ///
    /// Fails if the configured tick rate does not produce a usable period,
    /// so a bad config never reaches the loop.
    pub fn new(
        config: &OrchestratorConfig,
        state_source: impl StateSource + 'static,
        ledger: impl Ledger + 'static,
        engine: impl DecisionEngine + 'static,
    ) -> Result<Self> {
        let tick_period = config.tick_period()?;
        let (snapshots, _) = watch::channel(None);
        info!(
            tick_rate_hz = config.tick_rate_hz,
            period_ms = tick_period.as_millis() as u64,
            "orchestrator ready"
        );
        Ok(Self {
            tick_period,
            state_source: Box::new(state_source),
            ledger: Box::new(ledger),
            engine: Box::new(engine),
            latest_state: None,
            running: true,
            phase: TickPhase::Idle,
            halted_at: None,
            ticks: 0,
            snapshots,
            shutdown: CancellationToken::new(),
        })
    }

    /// Replace the stop signal, e.g. with a child of a process-wide token.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Handle that stops `run_continuous` / `run_simulation` at the next
    /// tick boundary or during the inter-tick sleep.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn latest_state(&self) -> Option<&StateVector> {
        self.latest_state.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    /// Step whose fault halted the orchestrator.
    pub fn halted_at(&self) -> Option<TickPhase> {
        self.halted_at
    }

    /// Number of ticks attempted so far, including a failed one.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Observe committed state from another task without racing the tick.
    pub fn subscribe(&self) -> watch::Receiver<Option<StateSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Run one full tick.
    ///
    /// On success the new state becomes `latest_state` and the ledger's
    /// transaction id is returned (`None` when the ledger is offline). On a
    /// collaborator fault nothing is mutated except the run flag, which is
    /// cleared.
    pub async fn execute_tick(&mut self) -> std::result::Result<Option<TxnId>, TickError> {
        self.ticks += 1;
        let seq = self.ticks;
        let span = info_span!("tick", tick_id = %Uuid::new_v4(), seq);

        async move {
            match self.pipeline().await {
                Ok((state, txn_id)) => {
                    match &txn_id {
                        Some(id) => info!(txn_id = %id, state = %state, "tick complete"),
                        None => warn!(state = %state, "tick complete, commit skipped (ledger offline)"),
                    }
                    self.latest_state = Some(state.clone());
                    self.phase = TickPhase::Idle;
                    self.snapshots.send_replace(Some(StateSnapshot {
                        seq,
                        vector: state,
                        txn_id: txn_id.clone(),
                        committed_at: Utc::now(),
                    }));
                    Ok(txn_id)
                }
                Err(err) => {
                    error!(
                        step = err.step.as_str(),
                        operation = err.step.operation().unwrap_or("-"),
                        error = %err.source,
                        "tick failed, halting"
                    );
                    self.running = false;
                    self.phase = TickPhase::Halted;
                    self.halted_at = Some(err.step);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn pipeline(&mut self) -> std::result::Result<(StateVector, Option<TxnId>), TickError> {
        self.phase = TickPhase::Measuring;
        let measurement = self
            .state_source
            .measure()
            .await
            .map_err(|e| TickError::new(TickPhase::Measuring, e))?;
        debug!(vector = %measurement, "measured");

        self.phase = TickPhase::Retrieving;
        let history = self
            .ledger
            .lookup(&measurement, TimestampSelector::Latest)
            .await
            .map_err(|e| TickError::new(TickPhase::Retrieving, e))?;
        if history.synthetic {
            warn!("ledger offline, continuing with synthetic history");
        }

        self.phase = TickPhase::Deciding;
        let action = self
            .engine
            .decide(&history)
            .await
            .map_err(|e| TickError::new(TickPhase::Deciding, e))?;
        debug!(
            action = %action.action,
            priority = %action.priority,
            payload_len = action.payload_len(),
            "decided"
        );

        let next = combine(&measurement, &action);

        self.phase = TickPhase::Committing;
        let txn_id = self
            .ledger
            .commit(&next)
            .await
            .map_err(|e| TickError::new(TickPhase::Committing, e))?;

        Ok((next, txn_id))
    }
}
