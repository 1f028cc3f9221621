//! wirego command line entry point.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wirego::{GeneratorConfig, WriteOutcome};

/// Command line interface for wirego.
#[derive(Parser, Debug)]
#[command(name = "wirego")]
#[command(about = "Generates dependency-injection constructors for a Go module")]
#[command(version)]
struct Cli {
    /// Module root to scan
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Module path (default: the module line of <path>/go.mod)
    #[arg(long)]
    module: Option<String>,

    /// Environment selector for BindEnv directives
    #[arg(long, env = "ENV")]
    env: Option<String>,

    /// Render and report without writing files
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> anyhow::Result<()> {
    let mut builder = GeneratorConfig::builder()
        .root(&cli.path)
        .dry_run(cli.dry_run);
    if let Some(module) = &cli.module {
        builder = builder.module(module);
    }
    builder = match cli.env.as_deref().filter(|env| !env.is_empty()) {
        Some(env) => builder.env(env),
        None => builder.without_env(),
    };
    let config = builder.build();

    let report = wirego::run(&config)
        .with_context(|| format!("generation failed under {}", config.root.display()))?;

    if config.dry_run {
        for (path, outcome) in &report.units {
            tracing::info!("{}: {:?} (dry run)", path.display(), outcome);
        }
    }
    tracing::info!(
        "{} written, {} unchanged, {} removed",
        report.written(),
        report.count(WriteOutcome::Unchanged),
        report.count(WriteOutcome::Removed)
    );
    Ok(())
}
