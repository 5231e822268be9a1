pub mod health;
pub mod run;
pub mod simulate;

use anyhow::Context;
use commander_core::{sim, Config, Orchestrator, RunStop};

// ---------------------------------------------------------------------------
// Exit: typed process outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Halted,
    Unhealthy,
}

impl Exit {
    pub fn exit_code(self) -> i32 {
        match self {
            Exit::Success => 0,
            Exit::Halted => 2,
            Exit::Unhealthy => 3,
        }
    }

    pub fn from_stop(stop: &RunStop) -> Self {
        match stop {
            RunStop::Halted { .. } => Exit::Halted,
            RunStop::Cancelled | RunStop::Completed => Exit::Success,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Build the orchestrator and cancel its shutdown token on Ctrl-C.
///
/// Must be called from inside the tokio runtime.
pub fn start(config: &Config) -> anyhow::Result<Orchestrator> {
    let orchestrator =
        sim::build_orchestrator(config).context("failed to initialize orchestrator")?;

    let token = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current tick");
            token.cancel();
        }
    });

    Ok(orchestrator)
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
