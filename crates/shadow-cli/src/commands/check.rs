//! Check command - classify a single flow
//!
//! Useful for verifying rule precedence without capturing any traffic.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use shadow_core::config::Config;
use shadow_core::rules::{CountryLookup, NoCountryLookup};
use shadow_core::{Classifier, Decision, Flow, Verdict};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Destination domain
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Destination address
    #[arg(short, long, value_name = "IP")]
    pub ip: Option<IpAddr>,

    /// Originating application (name or path)
    #[arg(short, long)]
    pub app: Option<String>,

    /// Country code to assume for the destination address
    #[arg(long, value_name = "CC", requires = "ip")]
    pub country: Option<String>,
}

/// Answers every lookup with the same country
struct FixedCountry(String);

impl CountryLookup for FixedCountry {
    fn country_code(&self, _addr: IpAddr) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Execute check command
pub fn execute(args: CheckArgs) -> Result<()> {
    if args.domain.is_none() && args.ip.is_none() && args.app.is_none() {
        bail!("Nothing to check: pass at least one of --domain, --ip or --app");
    }

    let path = super::config::resolve_config_path(args.config.clone())?;
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    let decision = decide(&config, &args)?;
    print_decision(&args, decision);
    Ok(())
}

fn decide(config: &Config, args: &CheckArgs) -> Result<Decision> {
    let lookup: Arc<dyn CountryLookup> = match args.country {
        Some(ref code) => Arc::new(FixedCountry(code.clone())),
        None => Arc::new(NoCountryLookup),
    };
    let classifier = Classifier::from_config(config, lookup).context("Failed to build rules")?;

    let flow = Flow {
        domain: args.domain.as_deref(),
        addr: args.ip,
        app: args.app.as_deref(),
    };
    Ok(classifier.decide(&flow))
}

fn print_decision(args: &CheckArgs, decision: Decision) {
    let verdict = match decision.verdict {
        Verdict::Proxy => decision.verdict.to_string().green().bold(),
        Verdict::Direct => decision.verdict.to_string().cyan().bold(),
        Verdict::Blocked => decision.verdict.to_string().red().bold(),
    };

    if let Some(ref domain) = args.domain {
        println!("Domain:  {}", domain);
    }
    if let Some(ip) = args.ip {
        println!("Address: {}", ip);
    }
    if let Some(ref app) = args.app {
        println!("App:     {}", app);
    }
    println!("Verdict: {} (by {} rule)", verdict, decision.source);
}
