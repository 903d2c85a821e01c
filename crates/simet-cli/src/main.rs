//! simet
//!
//! Command-line evaluator for synthetic data.
//!
//! Reads a YAML run description, loads the real and synthetic populations,
//! evaluates every configured restraint and reports whether the synthetic
//! data stays within all bounds. Exit status: 0 pass, 1 fail, 2 error.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use simet_core::LifecycleHook;
use simet_restraints::ExecutionMode;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{debug, info};

mod config;
mod render;

use config::EvaluationConfig;
use render::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "simet")]
#[command(about = "Evaluate synthetic data against real data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an evaluation and print the report
    Run(RunArgs),

    /// Check a configuration file without loading any data
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = "simet.yaml")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "simet.yaml")]
    config: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Override the configured seed
    #[arg(long, env = "SIMET_SEED")]
    seed: Option<u64>,

    /// Override the configured execution mode (parallel | sequential)
    #[arg(short, long)]
    execution: Option<ExecutionMode>,

    /// Print a Prometheus snapshot of run metrics after the report
    #[arg(long)]
    metrics: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Also write logs to `simet.log` in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Validate { config } => validate(&config).map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Run one evaluation; `Ok(passed)` carries the verdict
async fn run(args: RunArgs) -> Result<bool> {
    // A log directory given on the command line is relative to the working directory
    let log_dir = match args.log_dir {
        Some(dir) => Some(std::env::current_dir()?.join(dir)),
        None => None,
    };

    let mut config = EvaluationConfig::load(&args.config)?;
    config.apply_overrides(args.seed, args.execution, log_dir);

    TracingHook::new(args.verbose, args.json_logs, config.resolved_log_dir()).on_start()?;
    info!(config = %args.config.display(), "Starting simet");
    info!(
        seed = config.seed,
        execution = ?config.execution,
        restraints = config.restraints.len(),
        "Configuration loaded"
    );

    let metrics_handle = if args.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let pipeline = config.build_pipeline()?;
    let report = pipeline.run().await?;

    println!("{}", render::render(&report, args.format)?);
    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    Ok(report.passed)
}

/// Parse the configuration and build every restraint
fn validate(path: &Path) -> Result<()> {
    let config = EvaluationConfig::load(path)?;
    let restraints = config.validate()?;

    println!("{}: OK", path.display());
    println!("  seed: {}", config.seed);
    println!("  execution: {:?}", config.execution);
    println!("  batch size: {}", config.loader.batch_size);
    for spec in &config.restraints {
        let kind = spec.kind();
        let (lower, upper) = spec.bounds();
        println!(
            "  - {} [{}, {}] ({} is better)",
            kind.default_name(),
            lower,
            upper,
            if kind.higher_is_better() { "higher" } else { "lower" }
        );
    }
    debug!(restraints = restraints.len(), "Configuration valid");
    Ok(())
}

/// Log file written inside the configured log directory
const LOG_FILE: &str = "simet.log";

/// Installs the tracing subscriber
///
/// Logs go to stderr so reports on stdout stay machine-readable, and are
/// appended to `simet.log` when a log directory is configured.
struct TracingHook {
    verbose: bool,
    json: bool,
    log_dir: Option<PathBuf>,
}

impl TracingHook {
    fn new(verbose: bool, json: bool, log_dir: Option<PathBuf>) -> Self {
        Self {
            verbose,
            json,
            log_dir,
        }
    }

    fn open_log_file(&self) -> simet_core::Result<Option<File>> {
        let Some(dir) = &self.log_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;
        Ok(Some(file))
    }
}

impl LifecycleHook for TracingHook {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_start(&self) -> simet_core::Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = if self.verbose {
            EnvFilter::new("simet=debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("simet=info"))
        };

        let file_layer = self.open_log_file()?.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);
        let installed = if self.json {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        };

        installed.map_err(|e| simet_core::Error::internal(format!("failed to install tracing: {e}")))
    }
}

/// Initialize metrics recorder and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_histogram!(
        "simet_restraint_latency_us",
        metrics::Unit::Microseconds,
        "Restraint evaluation latency in microseconds"
    );
    metrics::describe_counter!(
        "simet_restraint_evaluations_total",
        "Restraint evaluations by restraint and outcome"
    );

    info!("Metrics recorder initialized");
    Ok(handle)
}
