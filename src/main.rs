use anyhow::{anyhow, Result};
use clap::Parser;
use std::io;
use std::process::ExitCode;

mod apply;
mod cli;
mod config;
mod confirm;
mod discover;
mod error;
mod insert;
mod logging;
mod normalize;
mod orchestrator;
mod principles;
mod resolve;
mod rules;
mod util;

use cli::RootArgs;
use config::{load_config, NormalizeConfig};
use confirm::{Confirm, Fixed, Prompt};
use error::RunError;
use orchestrator::RunOutcome;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    logging::init(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RootArgs) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(err) => return Ok(abort(&err)),
        },
        None => NormalizeConfig::default(),
    };
    let base = args
        .base
        .clone()
        .or_else(util::default_base_dir)
        .ok_or_else(|| anyhow!("cannot locate a home directory; pass --base"))?;

    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(Fixed(true))
    } else {
        Box::new(Prompt::new(io::stdin().lock(), io::stdout()))
    };
    let mut out = io::stdout();

    let outcome = match orchestrator::run(
        &config,
        &base,
        args.dry_run,
        confirm.as_mut(),
        &mut out,
    ) {
        Ok(outcome) => outcome,
        Err(RunError::Config(err)) => return Ok(abort(&err)),
        Err(err) => return Err(err.into()),
    };

    let summary = outcome.summary();
    tracing::debug!(
        files = summary.files_changed(),
        changes = summary.total_changes(),
        failures = summary.failures(),
        "run finished"
    );
    Ok(match outcome {
        RunOutcome::Unprocessed(_) => ExitCode::FAILURE,
        RunOutcome::Applied(summary) if summary.failures() > 0 => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn abort(err: &error::ConfigError) -> ExitCode {
    tracing::error!(error = %err, "aborting before any document was touched");
    eprintln!("Aborting: {err}");
    ExitCode::from(2)
}
