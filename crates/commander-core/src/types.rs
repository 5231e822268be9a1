use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

// ---------------------------------------------------------------------------
// StateVector
// ---------------------------------------------------------------------------

/// Discrete, fixed-length state snapshot (bit-like components).
///
/// Used both for the measurement produced by a `StateSource` and for the new
/// state derived from it and committed to the `Ledger`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateVector(Vec<u8>);

impl StateVector {
    pub fn new(components: Vec<u8>) -> Self {
        Self(components)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u8> {
        self.0.iter()
    }

    /// Compact form, e.g. `01`.
    pub fn bitstring(&self) -> String {
        self.0.iter().map(|c| c.to_string()).collect()
    }
}

impl From<Vec<u8>> for StateVector {
    fn from(components: Vec<u8>) -> Self {
        Self(components)
    }
}

impl FromIterator<u8> for StateVector {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HistoricalRecord
// ---------------------------------------------------------------------------

/// Context returned by `Ledger::lookup` for a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// `true` when the ledger had no connection and fabricated this record.
    pub synthetic: bool,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<StateVector>,
}

impl HistoricalRecord {
    pub fn synthetic(data: impl Into<serde_json::Value>) -> Self {
        Self {
            synthetic: true,
            data: data.into(),
            vector: None,
        }
    }

    pub fn retrieved(vector: StateVector, data: impl Into<serde_json::Value>) -> Self {
        Self {
            synthetic: false,
            data: data.into(),
            vector: Some(vector),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Urgency attached to an `Action`. Open set: unknown labels are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    High,
    Medium,
    Low,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
            Priority::Other(label) => label,
        }
    }
}

impl From<String> for Priority {
    fn from(label: String) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "HIGH" => Priority::High,
            "MEDIUM" => Priority::Medium,
            "LOW" => Priority::Low,
            _ => Priority::Other(label),
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Structured decision produced by a `DecisionEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Symbolic action name, e.g. `ADJUST_ENTANGLEMENT_MATRIX`.
    pub action: String,
    pub priority: Priority,
    /// Opaque payload carried with the action. Its length drives the next
    /// state; an absent payload counts as length 0.
    #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Action {
    pub fn new(action: impl Into<String>, priority: Priority) -> Self {
        Self {
            action: action.into(),
            priority,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Length of the payload in characters, 0 when absent.
    pub fn payload_len(&self) -> usize {
        self.payload.as_deref().map_or(0, |p| p.chars().count())
    }

    /// Parse a decision service response of the form
    /// `{"action": "...", "priority": "..."}`.
    pub fn from_response(raw: &str) -> Result<Self, CollaboratorError> {
        let action: Action = serde_json::from_str(raw.trim())
            .map_err(|e| CollaboratorError::Malformed(format!("{e}: {raw}")))?;
        if action.action.trim().is_empty() {
            return Err(CollaboratorError::Malformed(
                "response has an empty action name".into(),
            ));
        }
        Ok(action)
    }
}

// ---------------------------------------------------------------------------
// TxnId / TimestampSelector
// ---------------------------------------------------------------------------

/// Identifier returned by `Ledger::commit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(String);

impl TxnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point in ledger history a lookup resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampSelector {
    #[default]
    Latest,
    At(DateTime<Utc>),
}
