//! `commander-core` — tick-driven orchestration of a measure → retrieve →
//! decide → commit pipeline.
//!
//! ```text
//! StateSource::measure ─▶ Ledger::lookup ─▶ DecisionEngine::decide
//!                                                  │
//!        Ledger::commit ◀── combine(measurement, action)
//! ```
//!
//! The [`Orchestrator`] owns the cadence and the failure policy (halt on the
//! first collaborator fault). Collaborators are capability traits in
//! [`collaborator`]; [`sim`] provides runnable built-in implementations.

pub mod collaborator;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod sim;
pub mod types;

pub use collaborator::{DecisionEngine, Ledger, StateSource};
pub use config::Config;
pub use error::{CollaboratorError, CommanderError, Result, TickError};
pub use orchestrator::{
    combine, Orchestrator, RunStop, RunSummary, SimulationReport, StateSnapshot, TickPhase,
};
pub use types::{Action, HistoricalRecord, Priority, StateVector, TimestampSelector, TxnId};
