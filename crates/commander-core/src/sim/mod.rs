//! Built-in collaborators so the orchestrator runs without external services.

mod advisor;
mod bell;
mod ledger;

pub use advisor::{RuleAdvisor, ADJUST_ACTION, HOLD_ACTION};
pub use bell::BellStateSource;
pub use ledger::{LedgerEntry, RedbLedger, SYNTHETIC_DATA};

use crate::collaborator::{DecisionEngine, Ledger, StateSource};
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::retry::Retry;

/// Wire the simulated collaborators described by `config` into an
/// orchestrator, wrapping each in its retry policy when one is configured.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let source = BellStateSource::from_config(&config.state_source)?;
    let source: Box<dyn StateSource> = match &config.state_source.retry {
        Some(policy) => Box::new(Retry::new(source, policy.clone())),
        None => Box::new(source),
    };

    let ledger = RedbLedger::from_config(&config.ledger)?;
    let ledger: Box<dyn Ledger> = match &config.ledger.retry {
        Some(policy) => Box::new(Retry::new(ledger, policy.clone())),
        None => Box::new(ledger),
    };

    let engine = RuleAdvisor::from_config(&config.decision);
    let engine: Box<dyn DecisionEngine> = match &config.decision.retry {
        Some(policy) => Box::new(Retry::new(engine, policy.clone())),
        None => Box::new(engine),
    };

    Orchestrator::new(&config.orchestrator, source, ledger, engine)
}

/// Orchestrator for health probes only: the ledger is never opened, so
/// probing leaves no trace on disk.
pub fn build_probe(config: &Config) -> Result<Orchestrator> {
    let source = BellStateSource::from_config(&config.state_source)?;
    let ledger = RedbLedger::offline(format!("{}:{}", config.ledger.host, config.ledger.port));
    let engine = RuleAdvisor::from_config(&config.decision);
    Orchestrator::new(&config.orchestrator, source, ledger, engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RunStop;
    use tempfile::TempDir;

    fn config(dir: &TempDir, token_env: &str) -> Config {
        let mut cfg = Config::new(50.0);
        cfg.state_source.seed = Some(3);
        cfg.ledger.token_env = token_env.into();
        cfg.ledger.path = dir.path().join("ledger.redb");
        cfg
    }

    #[tokio::test]
    async fn offline_stack_simulates_with_null_txn_ids() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, "COMMANDER_TEST_TOKEN_NEVER_SET");
        let mut orch = build_orchestrator(&cfg).unwrap();

        let report = orch.run_simulation(4).await.unwrap();

        assert_eq!(report.succeeded_steps, 4);
        assert_eq!(report.stop, RunStop::Completed);
        assert_eq!(report.last_txn_id, None);
        // Offline history holds, so the state stays a Bell outcome.
        let state = report.latest_state.unwrap();
        assert_eq!(state.as_slice()[0], state.as_slice()[1]);
        assert!(!dir.path().join("ledger.redb").exists());
    }

    #[tokio::test]
    async fn connected_stack_commits_every_step() {
        let dir = TempDir::new().unwrap();
        let token_env = "COMMANDER_SIM_TEST_TOKEN";
        std::env::set_var(token_env, "secret");
        let cfg = config(&dir, token_env);
        let mut orch = build_orchestrator(&cfg).unwrap();

        let report = orch.run_simulation(3).await.unwrap();
        std::env::remove_var(token_env);

        assert_eq!(report.succeeded_steps, 3);
        let txn = report.last_txn_id.unwrap();
        assert!(txn.as_str().ends_with("_3"));
        drop(orch);

        let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(Some(&entries[2].vector), report.latest_state.as_ref());
        assert!(entries.iter().all(|e| e.vector.len() == 2));
    }

    #[tokio::test]
    async fn retry_policies_wrap_without_changing_results() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir, "COMMANDER_TEST_TOKEN_NEVER_SET");
        cfg.state_source.retry = Some(Default::default());
        cfg.ledger.retry = Some(Default::default());
        cfg.decision.retry = Some(Default::default());
        let mut orch = build_orchestrator(&cfg).unwrap();

        assert!(orch.check_health().await);
        let report = orch.run_simulation(2).await.unwrap();
        assert_eq!(report.succeeded_steps, 2);
    }

    #[tokio::test]
    async fn probe_never_opens_the_ledger() {
        let dir = TempDir::new().unwrap();
        let token_env = "COMMANDER_PROBE_TEST_TOKEN";
        std::env::set_var(token_env, "secret");
        let cfg = config(&dir, token_env);

        let orch = build_probe(&cfg).unwrap();
        assert!(orch.check_health().await);
        std::env::remove_var(token_env);

        assert!(!dir.path().join("ledger.redb").exists());
    }
}
