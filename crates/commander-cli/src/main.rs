mod cmd;
mod output;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use commander_core::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "commander",
    about = "Commander orchestrator — tick-driven measure, retrieve, decide, commit loop",
    version
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "COMMANDER_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Operation mode (default: from orchestrator.simulation_mode)
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Step budget for simulate mode (default: orchestrator.simulation_steps)
    #[arg(long)]
    steps: Option<u32>,

    /// Output the run result as JSON
    #[arg(long, short = 'j')]
    json: bool,

    /// Log tick internals
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Real-time loop at tick_rate_hz until a fault or Ctrl-C
    Run,
    /// Bounded number of back-to-back ticks
    Simulate,
    /// Probe the state source and exit
    #[value(alias = "test_quantum_link")]
    Health,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config '{}'", cli.config.display()))?;

    let mode = cli.mode.unwrap_or(if config.orchestrator.simulation_mode {
        Mode::Simulate
    } else {
        Mode::Run
    });
    tracing::info!(mode = ?mode, "initializing commander orchestrator");

    let exit = match mode {
        Mode::Run => cmd::run::run(&config, cli.json)?,
        Mode::Simulate => {
            let steps = cli.steps.unwrap_or(config.orchestrator.simulation_steps);
            cmd::simulate::run(&config, steps, cli.json)?
        }
        Mode::Health => cmd::health::run(&config, cli.json)?,
    };

    tracing::info!("commander process finished");
    Ok(exit.exit_code())
}
