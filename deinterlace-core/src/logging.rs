//! Logging setup (spec §1a): a console layer and a daily-rotating file
//! layer, each with its own `EnvFilter`.
//!
//! Grounded on `av1an-core/src/logging.rs`'s `init_logging`: two
//! `tracing_subscriber::fmt` layers composed on one `Registry`, a
//! `tracing_appender` rolling file writer behind a `non_blocking` guard
//! that must be kept alive for the process lifetime, and a console layer
//! tuned for a terminal (ANSI only when connected to one, no target/file
//! noise). Simplified from the teacher's per-module `HashMap` of filters,
//! since this crate has no scene-detection-style submodule that needs a
//! quieter level than the rest.

use std::io::IsTerminal;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

static WORKER_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialize the global `tracing` subscriber. `console_level` drives the
/// stderr layer (adjusted by `-q`/`-v`, spec §1c); the file layer always
/// logs at `DEBUG` or finer so a run can be replayed from the log alone.
pub fn init_logging(console_level: LevelFilter, log_file: &Path) {
    let file_level = console_level.max(LevelFilter::DEBUG);

    let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("logs"));
    let file_name = log_file.file_name().unwrap_or_else(|| std::ffi::OsStr::new("deinterlace.log"));
    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // The first caller wins; a second `init_logging` call (tests, repeated
    // CLI invocations in one process) is a no-op rather than a panic.
    let _ = WORKER_GUARD.set(guard);

    let file_filter = EnvFilter::try_new(format!("deinterlace_core={file_level},deinterlace_cli={file_level}"))
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    let console_filter = EnvFilter::try_new(format!(
        "deinterlace_core={console_level},deinterlace_cli={console_level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(non_blocking)
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .compact()
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false)
                .with_file(false)
                .without_time()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        );

    let _ = tracing::subscriber::set_global_default(subscriber);
    tracing::debug!("logging initialized");
}
