//! Run command - load the rules and supervise until shutdown

use anyhow::{Context, Result};
use clap::Args;
use shadow_core::rules::NoCountryLookup;
use shadow_core::{AppContext, Classifier};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-operation timeout for collaborators, in seconds
    #[arg(short = 't', long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Validate and build the rules, then exit
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    info!("Starting shadow...");

    let path = super::config::resolve_config_path(args.config)?;
    let ctx = AppContext::from_file(&path, Duration::from_secs(args.timeout))
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    // Country database access belongs to the resolver collaborator
    let classifier = ctx
        .build_classifier(Arc::new(NoCountryLookup))
        .context("Failed to build rules")?;
    log_summary(&ctx, &classifier);

    if args.dry_run {
        warn!("Dry run mode - exiting after rule build");
        info!("Configuration validated successfully");
        ctx.close();
        return Ok(());
    }

    // Set up signal handler
    let handler_ctx = ctx.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        handler_ctx.close();
    })
    .context("Failed to set signal handler")?;

    info!("Waiting for flows; press Ctrl-C to stop");
    ctx.done().wait();

    info!("shadow stopped");
    Ok(())
}

fn log_summary(ctx: &AppContext, classifier: &Classifier) {
    let config = ctx.config();
    info!(
        server = %config.server,
        name_server = %config.name_server,
        tun = config.tun_name.as_deref().unwrap_or("-"),
        timeout_secs = ctx.timeout().as_secs(),
        "Loaded configuration"
    );
    info!(
        domain_rules = classifier.domains().len(),
        cidr_rules = classifier.cidrs().len(),
        "Rules ready"
    );
}
