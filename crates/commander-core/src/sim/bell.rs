use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::collaborator::StateSource;
use crate::config::{StateSourceConfig, KNOWN_BACKENDS};
use crate::error::{CollaboratorError, CommanderError, Result};
use crate::types::StateVector;

/// Two-qubit entangled pair, sampled shot by shot.
///
/// `bell` prepares `H(q0); CX(q0, q1)` so every shot collapses to `00` or
/// `11`; `psi` adds an X on q1 so shots collapse to `01` or `10`. The most
/// frequent outcome across all shots becomes the measurement.
pub struct BellStateSource {
    backend: String,
    shots: u32,
    outcomes: [u8; 2],
    rng: Mutex<StdRng>,
}

impl BellStateSource {
    pub fn from_config(config: &StateSourceConfig) -> Result<Self> {
        if config.shots == 0 {
            return Err(CommanderError::InvalidConfig(
                "state_source.shots must be greater than 0".into(),
            ));
        }
        let outcomes = match config.entanglement_model.as_str() {
            "bell" => [0b00, 0b11],
            "psi" => [0b01, 0b10],
            other => {
                return Err(CommanderError::InvalidConfig(format!(
                    "unsupported entanglement model '{other}'"
                )))
            }
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        tracing::info!(
            backend = %config.backend,
            shots = config.shots,
            model = %config.entanglement_model,
            "state source initialized"
        );
        Ok(Self {
            backend: config.backend.clone(),
            shots: config.shots,
            outcomes,
            rng: Mutex::new(rng),
        })
    }

    fn backend_available(&self) -> bool {
        KNOWN_BACKENDS.contains(&self.backend.as_str())
    }

    fn sample_counts(&self) -> std::result::Result<[u32; 4], CollaboratorError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CollaboratorError::Backend("sampler lock poisoned".into()))?;
        let mut counts = [0u32; 4];
        for _ in 0..self.shots {
            let outcome = self.outcomes[usize::from(rng.gen_bool(0.5))];
            counts[outcome as usize] += 1;
        }
        Ok(counts)
    }
}

/// Index of the most frequent outcome; ties go to the lower bitstring.
fn most_probable(counts: &[u32; 4]) -> usize {
    let mut best = 0;
    for (outcome, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = outcome;
        }
    }
    best
}

#[async_trait]
impl StateSource for BellStateSource {
    async fn measure(&self) -> std::result::Result<StateVector, CollaboratorError> {
        if !self.backend_available() {
            return Err(CollaboratorError::Transport(format!(
                "backend '{}' is not available",
                self.backend
            )));
        }
        let counts = self.sample_counts()?;
        let outcome = most_probable(&counts);
        let vector = StateVector::new(vec![((outcome >> 1) & 1) as u8, (outcome & 1) as u8]);
        tracing::debug!(
            counts = ?counts,
            vector = %vector,
            "measurement collapsed"
        );
        Ok(vector)
    }

    async fn health_check(&self) -> bool {
        self.backend_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str, seed: u64) -> StateSourceConfig {
        StateSourceConfig {
            shots: 256,
            entanglement_model: model.into(),
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn bell_pair_measures_correlated_bits() {
        let source = BellStateSource::from_config(&config("bell", 7)).unwrap();
        for _ in 0..20 {
            let v = source.measure().await.unwrap();
            assert_eq!(v.len(), 2);
            assert_eq!(v.as_slice()[0], v.as_slice()[1]);
        }
    }

    #[tokio::test]
    async fn psi_pair_measures_anticorrelated_bits() {
        let source = BellStateSource::from_config(&config("psi", 7)).unwrap();
        for _ in 0..20 {
            let v = source.measure().await.unwrap();
            assert_ne!(v.as_slice()[0], v.as_slice()[1]);
        }
    }

    #[tokio::test]
    async fn same_seed_same_measurements() {
        let a = BellStateSource::from_config(&config("bell", 42)).unwrap();
        let b = BellStateSource::from_config(&config("bell", 42)).unwrap();
        for _ in 0..10 {
            assert_eq!(a.measure().await.unwrap(), b.measure().await.unwrap());
        }
    }

    #[tokio::test]
    async fn unknown_backend_is_unhealthy_and_faults() {
        let mut cfg = config("bell", 1);
        cfg.backend = "ibm_brisbane".into();
        let source = BellStateSource::from_config(&cfg).unwrap();
        assert!(!source.health_check().await);
        let err = source.measure().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn zero_shots_rejected() {
        let mut cfg = config("bell", 1);
        cfg.shots = 0;
        assert!(BellStateSource::from_config(&cfg).is_err());
    }

    #[test]
    fn ties_prefer_lower_outcome() {
        assert_eq!(most_probable(&[5, 0, 0, 5]), 0);
        assert_eq!(most_probable(&[1, 0, 0, 5]), 3);
        assert_eq!(most_probable(&[0, 3, 3, 0]), 1);
    }
}
