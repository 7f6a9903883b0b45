//! CLI entry point for the trip statistics tool.
//!
//! Provides subcommands for running the full pipeline, running either
//! analysis pass on its own, and previewing a dataset.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use tripstat::analyzers::analyzer::analyze_path;
use tripstat::analyzers::parallel::analyze_parallel;
use tripstat::config::{AggregationMode, FarePolicy, PipelineConfig};
use tripstat::output::{self, print_json, print_pretty, render_summary};
use tripstat::pipeline::{PipelineStep, TripPipeline};

#[derive(Parser)]
#[command(name = "tripstat")]
#[command(about = "Validate trip records and compute aggregate statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every pipeline step: preview, streaming pass, parallel pass
    Run(DatasetArgs),
    /// Stream the dataset batch by batch and print the summary
    Stream(DatasetArgs),
    /// Analyze the dataset on several workers and print the summary
    Parallel(DatasetArgs),
    /// Log the first rows of the dataset
    Preview(DatasetArgs),
}

#[derive(Args)]
struct DatasetArgs {
    /// Path to a .csv or .parquet trip dataset
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Rows per batch
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Number of workers for the parallel pass (defaults to CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Accept a zero fare or total amount
    #[arg(long, default_value_t = false)]
    allow_zero_fare: bool,

    /// Aggregate without running the validators
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Directory reports are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also print the result as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl DatasetArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env()?;
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.allow_zero_fare {
            config = config.with_fare_policy(FarePolicy::AllowZero);
        }
        if self.raw {
            config = config.with_mode(AggregationMode::Raw);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/tripstat.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("tripstat.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config = args.config()?;
            let report = TripPipeline::new(&args.path, config).run().await?;

            for path in &report.written {
                info!(path = %path.display(), "Report written");
            }
            if args.json {
                print_json(&report)?;
            }
        }
        Commands::Stream(args) => {
            let config = args.config()?;
            match analyze_path(&args.path, &config)? {
                Some(report) => {
                    print_pretty(&report.summary);
                    print!("{}", render_summary(&report.summary));
                    output::write_summary(
                        &config.output_dir,
                        output::STREAMING_SUMMARY_FILE,
                        &report.summary,
                    )?;
                    if args.json {
                        print_json(&report)?;
                    }
                }
                None => warn!("No aggregate produced, see the log for the cause"),
            }
        }
        Commands::Parallel(args) => {
            let config = args.config()?;
            match analyze_parallel(&args.path, &config).await? {
                Some(report) => {
                    for worker in &report.workers {
                        info!(
                            worker = worker.worker,
                            batches = worker.batches,
                            rows = worker.partial.rows,
                            failed_batches = worker.failed_batches,
                            "Worker result"
                        );
                    }
                    print!("{}", render_summary(&report.summary));
                    output::write_summary(
                        &config.output_dir,
                        output::PARALLEL_SUMMARY_FILE,
                        &report.summary,
                    )?;
                    if args.json {
                        print_json(&report)?;
                    }
                }
                None => warn!("No aggregate produced, see the log for the cause"),
            }
        }
        Commands::Preview(args) => {
            let config = args.config()?;
            TripPipeline::new(&args.path, config)
                .with_steps([PipelineStep::Preview])
                .run()
                .await?;
        }
    }

    Ok(())
}
