use commander_core::{Config, RunStop};

use super::{runtime, start, Exit};
use crate::output::{print_fields, print_json};

pub fn run(config: &Config, json: bool) -> anyhow::Result<Exit> {
    let rt = runtime()?;
    let summary = rt.block_on(async {
        let mut orchestrator = start(config)?;
        anyhow::Ok(orchestrator.run_continuous().await)
    })?;

    if json {
        print_json(&summary)?;
    } else {
        print_fields(&[
            ("ticks", summary.ticks_completed.to_string()),
            ("stopped", describe(&summary.stop)),
            (
                "state",
                summary
                    .latest_state
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |s| s.to_string()),
            ),
        ]);
    }

    Ok(Exit::from_stop(&summary.stop))
}

pub fn describe(stop: &RunStop) -> String {
    match stop {
        RunStop::Halted { step } => format!("halted during {step}"),
        RunStop::Cancelled => "cancelled".to_string(),
        RunStop::Completed => "completed".to_string(),
    }
}
