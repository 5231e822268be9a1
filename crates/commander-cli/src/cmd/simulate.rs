use commander_core::Config;

use super::run::describe;
use super::{runtime, start, Exit};
use crate::output::{print_fields, print_json};

pub fn run(config: &Config, steps: u32, json: bool) -> anyhow::Result<Exit> {
    let rt = runtime()?;
    let report = rt.block_on(async {
        let mut orchestrator = start(config)?;
        anyhow::Ok(orchestrator.run_simulation(steps).await?)
    })?;

    if json {
        print_json(&report)?;
    } else {
        print_fields(&[
            (
                "steps",
                format!("{}/{}", report.executed_steps, report.requested_steps),
            ),
            ("succeeded", report.succeeded_steps.to_string()),
            ("stopped", describe(&report.stop)),
            (
                "last txn",
                report
                    .last_txn_id
                    .as_ref()
                    .map_or_else(|| "none (ledger offline)".to_string(), |t| t.to_string()),
            ),
            (
                "state",
                report
                    .latest_state
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |s| s.to_string()),
            ),
        ]);
    }

    if report.halted_early() {
        tracing::warn!(
            executed = report.executed_steps,
            requested = report.requested_steps,
            "simulation terminated early"
        );
    }
    Ok(Exit::from_stop(&report.stop))
}
