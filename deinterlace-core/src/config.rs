//! `BatchConfig`: the value object the CLI crate builds from parsed
//! arguments and hands to the core crate, keeping `deinterlace-core` free
//! of `clap` types (spec §1c).
//!
//! Grounded on `av1an-core/src/settings.rs`'s `EncodeArgs` — the core
//! crate's own plain-data settings struct that `av1an-cli::parse_cli`
//! builds from `CliOpts` before handing it to `Av1anContext::new`.

use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_root: PathBuf,
    pub output_root: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub console_level: LevelFilter,
    pub log_file: PathBuf,
    pub dry_run: bool,
}

impl BatchConfig {
    /// Resolve `concurrency` to a concrete worker count (spec §4.4:
    /// `⌊activeCPUs / 2⌋` when unset).
    pub fn resolved_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(crate::broker::default_concurrency)
    }
}
