use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::TickPhase;

/// Fault surfaced by a collaborator call.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl CollaboratorError {
    /// Only transport faults are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollaboratorError::Transport(_))
    }
}

/// A tick aborted at `step`.
#[derive(Debug, Clone, Error)]
#[error("tick failed during {step}: {source}")]
pub struct TickError {
    pub step: TickPhase,
    #[source]
    pub source: CollaboratorError,
}

impl TickError {
    pub fn new(step: TickPhase, source: CollaboratorError) -> Self {
        Self { step, source }
    }
}

#[derive(Debug, Error)]
pub enum CommanderError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("ledger store error: {0}")]
    LedgerStore(String),

    #[error(transparent)]
    Tick(#[from] TickError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CommanderError>;
