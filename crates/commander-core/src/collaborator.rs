//! Capability traits for the three services a tick talks to.
//!
//! The orchestrator only sees these traits, so any backend (or test double)
//! can be plugged in without touching the tick loop.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::types::{Action, HistoricalRecord, StateVector, TimestampSelector, TxnId};

/// Produces the current measurement.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn measure(&self) -> Result<StateVector, CollaboratorError>;

    /// Never faults: an unreachable backend reports `false`.
    async fn health_check(&self) -> bool;
}

/// Keyed history lookup plus append-only commit.
///
/// A disconnected ledger degrades instead of failing: `lookup` returns a
/// synthetic record and `commit` returns `None`.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn lookup(
        &self,
        vector: &StateVector,
        at: TimestampSelector,
    ) -> Result<HistoricalRecord, CollaboratorError>;

    async fn commit(&self, state: &StateVector) -> Result<Option<TxnId>, CollaboratorError>;
}

/// Maps retrieved history to the next action.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn decide(&self, context: &HistoricalRecord) -> Result<Action, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Forwarding impls for owned and shared handles
// ---------------------------------------------------------------------------

#[async_trait]
impl<T: StateSource + ?Sized> StateSource for Box<T> {
    async fn measure(&self) -> Result<StateVector, CollaboratorError> {
        (**self).measure().await
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }
}

#[async_trait]
impl<T: StateSource + ?Sized> StateSource for Arc<T> {
    async fn measure(&self) -> Result<StateVector, CollaboratorError> {
        (**self).measure().await
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for Box<T> {
    async fn lookup(
        &self,
        vector: &StateVector,
        at: TimestampSelector,
    ) -> Result<HistoricalRecord, CollaboratorError> {
        (**self).lookup(vector, at).await
    }

    async fn commit(&self, state: &StateVector) -> Result<Option<TxnId>, CollaboratorError> {
        (**self).commit(state).await
    }
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for Arc<T> {
    async fn lookup(
        &self,
        vector: &StateVector,
        at: TimestampSelector,
    ) -> Result<HistoricalRecord, CollaboratorError> {
        (**self).lookup(vector, at).await
    }

    async fn commit(&self, state: &StateVector) -> Result<Option<TxnId>, CollaboratorError> {
        (**self).commit(state).await
    }
}

#[async_trait]
impl<T: DecisionEngine + ?Sized> DecisionEngine for Box<T> {
    async fn decide(&self, context: &HistoricalRecord) -> Result<Action, CollaboratorError> {
        (**self).decide(context).await
    }
}

#[async_trait]
impl<T: DecisionEngine + ?Sized> DecisionEngine for Arc<T> {
    async fn decide(&self, context: &HistoricalRecord) -> Result<Action, CollaboratorError> {
        (**self).decide(context).await
    }
}
