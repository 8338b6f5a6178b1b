//! Command line front-end for the finalize-and-convert pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use bids_core::config::{ConfigManager, PipelineVariant, Settings};
use bids_core::orchestrator::{PipelineError, SessionRunner};

#[derive(Parser)]
#[command(name = "bids-run", version, about = "Finalize and convert a BIDS session")]
struct Cli {
    /// Session root directory to process.
    root: PathBuf,

    /// Configuration file (created with defaults if absent).
    #[arg(long, default_value = ".config/bids-pipeline.toml")]
    config: PathBuf,

    /// Override the configured pipeline variant.
    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    /// Override the configured defacer worker count.
    #[arg(long)]
    jobs: Option<usize>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    /// Resolve the output directory from finalized.json.
    Metadata,
    /// Deface manifest records, then convert into bids/.
    Manifest,
}

impl From<VariantArg> for PipelineVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Metadata => PipelineVariant::MetadataDriven,
            VariantArg::Manifest => PipelineVariant::ManifestDriven,
        }
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut manager = ConfigManager::new(&cli.config);
    manager
        .load_or_create()
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let mut settings = manager.settings().clone();
    if let Some(variant) = cli.variant {
        settings.pipeline.variant = variant.into();
    }
    if let Some(jobs) = cli.jobs {
        settings.pipeline.deface_workers = jobs.max(1);
    }
    Ok(settings)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(6);
        }
    };

    let runner = SessionRunner::new(settings);
    let echo: bids_core::logging::LogCallback = Box::new(|line: &str| println!("{}", line));

    match runner.run(&cli.root, Some(echo), None, None) {
        Ok(report) => {
            tracing::info!(
                run = %report.run_name,
                completed = report.steps_completed.len(),
                deface_failures = report.deface_failures,
                "run finished"
            );
            if let Some(passed) = report.validation_passed {
                if !passed {
                    tracing::info!("validator reported findings; see validator.log");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &PipelineError) -> ExitCode {
    let code = error.exit_code();
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
