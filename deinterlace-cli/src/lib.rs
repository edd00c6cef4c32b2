//! Command-line wiring for the batch deinterlacer (spec §1c).
//!
//! Grounded on `av1an-cli/src/lib.rs`'s `CliOpts`/`parse_cli`/`run` shape:
//! a `clap`-derived options struct, a pure `parse_cli` that turns it into a
//! plain-data settings object (`BatchConfig` here, `EncodeArgs` there), and
//! a `run()` that wires logging, a `ctrlc` handler, and the core crate's
//! entry point together. This crate owns every `clap` type so
//! `deinterlace-core` stays free of CLI concerns.

use std::path::PathBuf;

use clap::Parser;
use deinterlace_core::broker::{scan_inputs, Scheduler};
use deinterlace_core::config::BatchConfig;
use deinterlace_core::ffmpeg_adapter::FfmpegMovieContainer;
use deinterlace_core::logging::init_logging;
use deinterlace_core::progress::BatchProgress;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

/// Batch video deinterlacer: recursively finds interlaced movies beneath
/// an input folder and writes progressive-scan, doubled-frame-rate copies.
#[derive(Parser, Debug)]
#[clap(name = "deinterlace", version = version())]
pub struct CliOpts {
    /// Root directory to scan for movie files
    pub input_folder: PathBuf,

    /// Output directory; defaults to a `_deinterlaced`-suffixed sibling of
    /// `input_folder`
    pub output_folder: Option<PathBuf>,

    /// Number of movies to process concurrently [default: activeCPUs / 2]
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Log file location
    #[clap(long, default_value = "logs/deinterlace.log")]
    pub log_file: PathBuf,

    /// Set the console log level
    #[clap(long, default_value = "info", ignore_case = true)]
    pub log_level: String,

    /// Suppress console progress output
    #[clap(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase console log verbosity
    #[clap(short, long)]
    pub verbose: bool,

    /// Scan and print the planned input -> output mapping without
    /// transforming anything
    #[clap(long)]
    pub dry_run: bool,
}

fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Turn parsed CLI options into a [`BatchConfig`] (spec §1c).
pub fn parse_cli(opts: CliOpts) -> anyhow::Result<BatchConfig> {
    let console_level = if opts.quiet {
        LevelFilter::WARN
    } else if opts.verbose {
        LevelFilter::DEBUG
    } else {
        opts.log_level.parse().unwrap_or(LevelFilter::INFO)
    };

    Ok(BatchConfig {
        input_root: opts.input_folder,
        output_root: opts.output_folder,
        concurrency: opts.concurrency,
        console_level,
        log_file: opts.log_file,
        dry_run: opts.dry_run,
    })
}

/// Process entry point: parse arguments, initialize logging, run the batch
/// to completion. Errors that reach here (scan failures, bad arguments)
/// are the only ones permitted to set a non-zero exit code (spec §1b).
pub fn run() -> anyhow::Result<()> {
    let cli_args = CliOpts::parse();
    let config = parse_cli(cli_args)?;

    init_logging(config.console_level, &config.log_file);

    let pairs = scan_inputs(&config.input_root, config.output_root.as_deref())?;
    info!(count = pairs.len(), "scanned input tree");

    if config.dry_run {
        for (input, output) in &pairs {
            println!("{} -> {}", input.display(), output.display());
        }
        return Ok(());
    }

    let mut scheduler: Scheduler<FfmpegMovieContainer> =
        Scheduler::new(pairs, |input, output| {
            FfmpegMovieContainer::open(input, output)
        });

    let cancel = scheduler.cancel_token();
    ctrlc::set_handler(move || {
        warn!("SIGINT received, cancelling in-flight movies");
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    })?;

    let progress = BatchProgress::new();
    let mut bars = std::collections::HashMap::new();
    scheduler.run_with_tick(config.resolved_concurrency(), |jobs| {
        for job in jobs {
            if !job.status.has_started() {
                continue;
            }
            let bar = bars
                .entry(job.input.clone())
                .or_insert_with(|| progress.add_movie(&job.input));
            BatchProgress::set_progress(bar, job.status.progress());
            if job.status.has_completed() {
                BatchProgress::finish_movie(bar, job.status.success());
            }
        }
    });

    let failed: Vec<_> = scheduler
        .jobs()
        .filter(|job| !job.status.success())
        .map(|job| job.input.display().to_string())
        .collect();
    if !failed.is_empty() {
        warn!(count = failed.len(), movies = ?failed, "some movies failed");
    }

    Ok(())
}
