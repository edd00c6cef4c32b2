//! Console progress display: one bar per in-flight movie, managed by the
//! Scheduler's admission loop (spec §4.4).
//!
//! Grounded on `av1an-core/src/progress_bar.rs`'s `MULTI_PROGRESS_BAR`
//! (`Lazy<(MultiProgress, Mutex<Vec<ProgressBar>>)>`): one shared
//! `MultiProgress` draw target, individual bars created on demand. This
//! crate's bars track a single `f64` fraction-complete per movie rather
//! than a frame position/length pair, since `MovieStatus::progress` is
//! already a normalized mean.

use std::path::Path;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const MOVIE_BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{wide_bar}] {percent:>3}% {msg}";

/// Tracks one progress bar per movie job, drawn together under one
/// `MultiProgress` (spec §1a/§4.4: operators watching a batch run want to
/// see every in-flight movie, not just an aggregate).
pub struct BatchProgress {
    multi: MultiProgress,
    style: ProgressStyle,
}

impl BatchProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::default_bar()
            .template(MOVIE_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        Self { multi, style }
    }

    /// Register a bar for one movie; `label` is typically the input path.
    pub fn add_movie(&self, label: &Path) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(self.style.clone());
        bar.set_message(label.display().to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar
    }

    /// Push a movie's `0.0..=1.0` progress fraction onto its bar.
    pub fn set_progress(bar: &ProgressBar, fraction: f64) {
        bar.set_position((fraction.clamp(0.0, 1.0) * 100.0) as u64);
    }

    pub fn finish_movie(bar: &ProgressBar, success: bool) {
        if success {
            bar.finish_with_message("done");
        } else {
            bar.abandon_with_message("failed");
        }
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}
