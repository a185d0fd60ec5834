//! Config command - configuration management

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use shadow_core::config::{Config, Format};
use std::path::PathBuf;
use tracing::info;

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Output format for rendered configuration
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON document
    Json,
    /// TOML document
    Toml,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Toml => Format::Toml,
        }
    }
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the normalized configuration
    Show {
        /// Config file to show (default: detect)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Generate an example configuration file
    Generate {
        /// Output file path; the extension picks the format
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate
        file: PathBuf,
    },

    /// Show config file locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show { file, format } => show_config(file, format),
        ConfigAction::Generate { output, force } => generate_config(output, force),
        ConfigAction::Validate { file } => validate_config(file),
        ConfigAction::Paths => show_paths(),
    }
}

/// Use the explicit path, or the first existing search path
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    match find_config_file() {
        Some(path) => {
            info!(path = %path.display(), "Using detected config file");
            Ok(path)
        }
        None => bail!("No configuration file found; pass --config or run 'shadow config paths'"),
    }
}

fn show_config(file: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let path = resolve_config_path(file)?;
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;

    let rendered = config
        .render(format.into())
        .context("Failed to serialize config")?;

    println!("{}", rendered);
    Ok(())
}

fn generate_config(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists; use --force to overwrite", output.display());
    }

    let content = Config::sample()
        .render(Format::from_path(&output))
        .context("Failed to serialize config")?;

    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    info!("Generated config file: {:?}", output);
    println!("Configuration file generated: {}", output.display());

    Ok(())
}

fn validate_config(file: PathBuf) -> Result<()> {
    let config = Config::load(&file)
        .with_context(|| format!("Failed to load config from {:?}", file))?;

    config.validate()
        .context("Configuration validation failed")?;

    let final_verdict = if config.geo_ip.final_verdict.is_empty() {
        "direct"
    } else {
        config.geo_ip.final_verdict.as_str()
    };

    println!("{}", "✓ Configuration is valid".green());
    println!("  Server: {}", config.server);
    println!(
        "  Domain rules: {} proxy, {} direct, {} blocked",
        config.domain_rules.proxy.len(),
        config.domain_rules.direct.len(),
        config.domain_rules.blocked.len()
    );
    println!("  CIDR rules: {}", config.ip_cidr_rules.proxy.len());
    println!("  App rules: {}", config.app_rules.proxy.len());
    println!(
        "  GeoIP: proxy {:?}, bypass {:?}, final {}",
        config.geo_ip.proxy, config.geo_ip.bypass, final_verdict
    );

    Ok(())
}

fn show_paths() -> Result<()> {
    println!("Configuration file search paths:");
    println!();

    for (i, path) in search_paths().iter().enumerate() {
        let marker = if path.exists() { "✓".green() } else { " ".normal() };
        println!("  {} {}. {}", marker, i + 1, path.display());
    }

    Ok(())
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("config.json"),
        PathBuf::from("shadow.json"),
        PathBuf::from("shadow.toml"),
    ];

    // User config directory
    if let Some(dirs) = directories::ProjectDirs::from("", "", "shadow") {
        paths.push(dirs.config_dir().join("config.json"));
        paths.push(dirs.config_dir().join("config.toml"));
    }

    paths
}

fn find_config_file() -> Option<PathBuf> {
    search_paths().into_iter().find(|path| path.is_file())
}
