use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use fleet_tbf::analyzer::Analyzer;
use fleet_tbf::config::Config;
use fleet_tbf::export;

/// Time-between-failure analysis of accelerator fleet install/remove logs.
#[derive(Parser)]
#[command(name = "fleet-tbf", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Event log to analyze; overrides `input` from the config file.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory; overrides `output_dir` from the config file.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

/// Build-time version info.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("fleet-tbf {}", version::full());
        return Ok(());
    }

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(input) = cli.input {
        cfg.input = input;
    }
    if let Some(output_dir) = cli.output_dir {
        cfg.output_dir = output_dir;
    }
    cfg.validate().context("invalid configuration")?;

    if let Some(Command::CheckConfig) = &cli.command {
        println!("configuration ok");
        return Ok(());
    }

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        input = %cfg.input.display(),
        "starting fleet-tbf",
    );

    let analysis = Analyzer::from_config(&cfg).run_file(&cfg.input)?;
    let paths = export::write_outputs(&analysis, &cfg)?;

    tracing::info!(report = %paths.report.display(), "fleet-tbf finished");

    Ok(())
}
