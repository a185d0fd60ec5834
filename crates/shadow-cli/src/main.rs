//! Shadow CLI
//!
//! Command-line front end for the rule and lifecycle core.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = logging::init(&args)?;

    let result = run(args);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(args: Args) -> Result<()> {
    match args.command {
        commands::Command::Run(run_args) => commands::run::execute(run_args),
        commands::Command::Check(check_args) => commands::check::execute(check_args),
        commands::Command::Config(config_args) => commands::config::execute(config_args),
        commands::Command::Completions(comp_args) => commands::completions::execute(comp_args),
    }
}
