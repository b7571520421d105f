// src/main.rs
// primerun - compute primes forever (or up to a limit), resumably

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use futures::{Stream, StreamExt};
use primerun::config::{DEFAULT_BATCH_SIZE, EnvOverrides, RunConfig};
use primerun::reporter::{ProgressReporter, ReportFormat};
use primerun::{BatchEngine, EventChannel, PrimeError, StopHandle, store, verify};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "primerun")]
#[command(about = "Resumable segmented-sieve prime search")]
#[command(version)]
struct Cli {
    /// Log every batch at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute primes, appending to the store (default)
    Run(RunArgs),

    /// Print the next value a run would start from
    ResumePoint {
        /// Prime store path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the store is a gap-free prefix of the primes
    Verify {
        /// Prime store path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Numbers re-sieved per segment
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        chunk: u64,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Numbers sieved per batch
    #[arg(short, long)]
    batch_size: Option<u64>,

    /// Stop before this value (runs forever when absent)
    #[arg(short, long)]
    limit: Option<u64>,

    /// Prime store path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Events buffered for a slow reporter before the oldest are dropped
    #[arg(long)]
    channel_capacity: Option<usize>,

    /// Report every Nth batch
    #[arg(long)]
    report_every: Option<u64>,

    /// Emit one JSON object per reported batch on stdout
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn overrides(&self) -> EnvOverrides {
        EnvOverrides {
            batch_size: self.batch_size,
            limit: self.limit,
            store_path: self.output.clone(),
            channel_capacity: self.channel_capacity,
            report_every: self.report_every,
        }
    }
}

/// Exit status after a forced interrupt (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

fn store_path(output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| RunConfig::from_env().store_path)
}

/// First interrupt requests a clean stop. Returns true on a second one.
async fn watch_interrupts<S>(mut interrupts: S, stop: StopHandle) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return false;
    }
    warn!("Stop requested, finishing current batch (interrupt again to exit now)");
    stop.stop();

    interrupts.next().await.is_some()
}

async fn run(args: RunArgs) -> Result<()> {
    let config = RunConfig::from_env().apply(args.overrides()).validated()?;
    info!("{}", config.summary());

    let events = EventChannel::new(config.channel_capacity);
    let engine = BatchEngine::from_config(&config, events.clone())?;
    let stop = engine.stop_handle();

    let format = if args.json {
        ReportFormat::Json
    } else {
        ReportFormat::Log
    };
    let mut reporter =
        ProgressReporter::new(config.report_every, format).stop_on_disconnect(stop.clone());
    if let Some(limit) = config.limit {
        reporter = reporter.with_limit(engine.cursor(), limit);
    }
    let reporter = reporter.spawn(events.subscribe());

    let engine = engine.spawn();

    tokio::spawn(async move {
        let interrupts = async_stream::stream! {
            while tokio::signal::ctrl_c().await.is_ok() {
                yield ();
            }
        };
        if watch_interrupts(Box::pin(interrupts), stop).await {
            error!("Interrupted again, exiting without finishing the batch");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    let report = engine.await.map_err(PrimeError::from)??;
    let summary = reporter.await?;

    info!(
        "Run {}: {} batches, {} primes, longest {} digits, next value {}",
        report.reason,
        report.stats.batch_index,
        report.stats.total_primes,
        report.stats.max_digit_count,
        report.next_value
    );
    if summary.dropped > 0 {
        info!("Reporter skipped {} events", summary.dropped);
    }

    Ok(())
}

fn run_resume_point(output: Option<PathBuf>) -> Result<()> {
    let path = store_path(output);
    let last = store::read_resume_point(&path)?;
    let next = store::next_value(last)?;
    println!("{}", next);
    Ok(())
}

fn run_verify(output: Option<PathBuf>, chunk: u64) -> Result<()> {
    let path = store_path(output);
    let report = verify::verify_store(&path, chunk)?;

    match &report.mismatch {
        None => {
            println!(
                "{}: {} primes verified, contiguous up to {}",
                path.display(),
                report.checked,
                report.last_verified.unwrap_or(1)
            );
            Ok(())
        }
        Some(mismatch) => {
            anyhow::bail!(
                "{}: not contiguous after {} records: {:?}",
                path.display(),
                report.checked,
                mismatch
            )
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        None => run(RunArgs::default()).await?,
        Some(Commands::Run(args)) => run(args).await?,
        Some(Commands::ResumePoint { output }) => run_resume_point(output)?,
        Some(Commands::Verify { output, chunk }) => run_verify(output, chunk)?,
    }

    Ok(())
}
