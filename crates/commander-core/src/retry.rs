//! Opt-in retry with exponential backoff at the collaborator-call boundary.
//!
//! The orchestrator itself never retries; wrapping a collaborator in
//! [`Retry`] lets transport faults be absorbed before they reach the tick.

use std::future::Future;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use crate::collaborator::{DecisionEngine, Ledger, StateSource};
use crate::error::CollaboratorError;
use crate::types::{Action, HistoricalRecord, StateVector, TimestampSelector, TxnId};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_jitter_factor() -> f64 {
    0.3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Calculate delay with exponential backoff and jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (clamped + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable fault, or
/// the retry budget is spent. The last fault is returned unchanged.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, CollaboratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "collaborator call failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry<C>
// ---------------------------------------------------------------------------

/// Collaborator decorator applying a [`RetryConfig`] to every fallible call.
pub struct Retry<C> {
    inner: C,
    config: RetryConfig,
}

impl<C> Retry<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: StateSource> StateSource for Retry<C> {
    async fn measure(&self) -> Result<StateVector, CollaboratorError> {
        retry_async(&self.config, "measure", || self.inner.measure()).await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

#[async_trait]
impl<C: Ledger> Ledger for Retry<C> {
    async fn lookup(
        &self,
        vector: &StateVector,
        at: TimestampSelector,
    ) -> Result<HistoricalRecord, CollaboratorError> {
        retry_async(&self.config, "lookup", || self.inner.lookup(vector, at)).await
    }

    async fn commit(&self, state: &StateVector) -> Result<Option<TxnId>, CollaboratorError> {
        retry_async(&self.config, "commit", || self.inner.commit(state)).await
    }
}

#[async_trait]
impl<C: DecisionEngine> DecisionEngine for Retry<C> {
    async fn decide(&self, context: &HistoricalRecord) -> Result<Action, CollaboratorError> {
        retry_async(&self.config, "decide", || self.inner.decide(context)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn transport_faults_are_retried_until_success() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry_async(&fast(), "test", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CollaboratorError::Transport("connection reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_faults_are_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), _> = retry_async(&fast(), "test", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::Malformed("bad json".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(CollaboratorError::Malformed(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_fault() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), _> = retry_async(&fast(), "test", || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::Transport(format!("attempt {n}")))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "transport failure: attempt 3");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    struct FlakySource {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl StateSource for FlakySource {
        async fn measure(&self) -> Result<StateVector, CollaboratorError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(CollaboratorError::Transport("qpu busy".into()));
            }
            Ok(StateVector::new(vec![1, 0]))
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn wrapper_absorbs_transient_measure_faults() {
        let source = Retry::new(
            FlakySource {
                failures_left: AtomicU32::new(2),
            },
            fast(),
        );
        assert_eq!(source.measure().await.unwrap(), StateVector::new(vec![1, 0]));
        assert!(source.health_check().await);
    }
}
