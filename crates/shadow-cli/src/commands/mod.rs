//! CLI commands

pub mod check;
pub mod completions;
pub mod config;
pub mod run;

use clap::Subcommand;

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the rules and supervise until interrupted (main command)
    Run(run::RunArgs),

    /// Classify a single flow against the configured rules
    Check(check::CheckArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}
