use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of the orchestrator within a tick.
///
/// Success path: `Idle → Measuring → Retrieving → Deciding → Committing → Idle`.
/// Any collaborator fault moves to `Halted`, which is terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPhase {
    Idle,
    Measuring,
    Retrieving,
    Deciding,
    Committing,
    Halted,
}

impl TickPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TickPhase::Idle => "idle",
            TickPhase::Measuring => "measuring",
            TickPhase::Retrieving => "retrieving",
            TickPhase::Deciding => "deciding",
            TickPhase::Committing => "committing",
            TickPhase::Halted => "halted",
        }
    }

    /// Collaborator operation performed in this phase, if any.
    pub fn operation(self) -> Option<&'static str> {
        match self {
            TickPhase::Measuring => Some("measure"),
            TickPhase::Retrieving => Some("lookup"),
            TickPhase::Deciding => Some("decide"),
            TickPhase::Committing => Some("commit"),
            TickPhase::Idle | TickPhase::Halted => None,
        }
    }
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation() {
            Some(op) => write!(f, "{} ({op})", self.as_str()),
            None => f.write_str(self.as_str()),
        }
    }
}
