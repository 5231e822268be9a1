use anyhow::Context;
use commander_core::{sim, Config};
use serde::Serialize;

use super::{runtime, Exit};
use crate::output::print_json;

#[derive(Serialize)]
struct HealthReport<'a> {
    healthy: bool,
    backend: &'a str,
}

pub fn run(config: &Config, json: bool) -> anyhow::Result<Exit> {
    let rt = runtime()?;
    let healthy = rt.block_on(async {
        let orchestrator =
            sim::build_probe(config).context("failed to initialize state source")?;
        anyhow::Ok(orchestrator.check_health().await)
    })?;

    if json {
        print_json(&HealthReport {
            healthy,
            backend: &config.state_source.backend,
        })?;
    } else {
        println!(
            "State source link ({}): {}",
            config.state_source.backend,
            if healthy { "OK" } else { "FAILED" }
        );
    }

    Ok(if healthy { Exit::Success } else { Exit::Unhealthy })
}
