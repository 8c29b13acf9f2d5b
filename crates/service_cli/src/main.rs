//! Exposure CLI - Monte Carlo exposure and XVA runs
//!
//! # Commands
//!
//! - `exposure run` - Simulate, value, aggregate and write CSV reports
//! - `exposure check` - Validate a run configuration
//!
//! The sample count can be overridden with `--samples` or the
//! `EXPOSURE_SAMPLES` environment variable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use service_cli::commands;

/// Exposure simulation and XVA CLI
#[derive(Parser)]
#[command(name = "exposure")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "exposure.toml")]
    config: String,

    /// Override the configured number of Monte Carlo samples
    #[arg(short, long, global = true, env = "EXPOSURE_SAMPLES")]
    samples: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full exposure and XVA pipeline
    Run {
        /// Output directory, overriding the configuration
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Check the run configuration
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Run { output_dir } => commands::run::run(&cli.config, cli.samples, output_dir)?,
        Commands::Check => commands::check::run(&cli.config, cli.samples)?,
    }
    Ok(())
}
