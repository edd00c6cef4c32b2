//! Batch Scheduler (component C4): walk an input tree into [`MovieJob`]s,
//! admit a bounded number of them concurrently, aggregate progress, and
//! propagate cancellation. Spec §4.4.
//!
//! Grounded on `av1an-core/src/broker.rs`'s `Broker`, which likewise owns a
//! fixed work queue and admits tasks up to a concurrency bound derived from
//! the CPU count (`num_cpus::get()`, as `av1an-core/src/lib.rs` computes its
//! own worker default); this crate's scheduler differs in that admission is
//! movie-level (one `MovieOrchestrator` per job) rather than task-level, and
//! polls job status instead of pulling from an mpsc `Sender`/`Receiver`
//! pair, since there is no per-task completion channel here — a job reports
//! its own completion via `MovieStatus`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::container::MovieContainer;
use crate::error::{MovieError, ScanError};
use crate::movie::{MovieJob, MovieOrchestrator};

/// Movie container extensions recognized by `scanInputs` (spec §4.4).
const MOVIE_EXTENSIONS: [&str; 5] = ["mov", "mp4", "m4v", "dv", "avi"];

/// Output filenames always land with this extension (spec §4.4: "extension
/// replaced by `.mov`").
const OUTPUT_EXTENSION: &str = "mov";

/// Suffix applied to the input root when no explicit output root is given
/// (spec §4.4).
const DEFAULT_OUTPUT_SUFFIX: &str = "_deinterlaced";

/// Recursively enumerate movie files beneath `input_root`, skipping hidden
/// entries, and compute each one's mirrored output path beneath
/// `output_root` (or a `_deinterlaced`-suffixed sibling of `input_root`).
/// Results are sorted by absolute input path (spec §4.4).
pub fn scan_inputs(
    input_root: &Path,
    output_root: Option<&Path>,
) -> Result<Vec<(PathBuf, PathBuf)>, ScanError> {
    if !input_root.exists() {
        return Err(ScanError::InputMissing(input_root.to_path_buf()));
    }
    if !input_root.is_dir() {
        return Err(ScanError::NotADirectory(input_root.to_path_buf()));
    }

    let output_root = output_root.map(Path::to_path_buf).unwrap_or_else(|| {
        let name = input_root
            .file_name()
            .map(|n| format!("{}{DEFAULT_OUTPUT_SUFFIX}", n.to_string_lossy()))
            .unwrap_or_else(|| "output_deinterlaced".to_string());
        input_root
            .parent()
            .map(|parent| parent.join(&name))
            .unwrap_or_else(|| PathBuf::from(name))
    });

    let mut pairs = Vec::new();
    for entry in WalkDir::new(input_root).follow_links(false) {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with('.') {
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let is_movie = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| MOVIE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !is_movie {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(input_root)
            .unwrap_or(entry.path());
        let mut output_path = output_root.join(relative);
        output_path.set_extension(OUTPUT_EXTENSION);
        pairs.push((entry.path().to_path_buf(), output_path));
    }

    if pairs.is_empty() {
        return Err(ScanError::Empty(input_root.to_path_buf()));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, output_path) in &pairs {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ScanError::CreateOutputDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(pairs)
}

/// Default concurrency when none is requested: `⌊activeCPUs / 2⌋`, floored
/// at 1 (spec §4.4 rationale: full saturation degrades throughput because
/// codec and writer threads contend with the per-movie pump).
pub fn default_concurrency() -> usize {
    (num_cpus::get() / 2).max(1)
}

struct QueuedJob<C: MovieContainer> {
    job: Arc<MovieJob>,
    orchestrator: Option<MovieOrchestrator<C>>,
}

/// Owns the job vector and the cancel token shared by every
/// [`MovieOrchestrator`] it starts (spec §9: "the Scheduler owns the job
/// vector; SIGINT handler is registered with a reference to that vector, or
/// a cancel token shared with it").
pub struct Scheduler<C: MovieContainer> {
    jobs: Vec<QueuedJob<C>>,
    cancel: Arc<AtomicBool>,
}

impl<C: MovieContainer + 'static> Scheduler<C> {
    /// Build a scheduler from `scan_inputs`' pairs. `make_container` opens
    /// the real reader/writer collaborator for one input/output pair;
    /// failures there are reported inline and exclude that movie from the
    /// batch rather than aborting it (spec §4.4's scan/admission step never
    /// names a container-open failure as fatal to the rest of the batch).
    pub fn new<F>(pairs: Vec<(PathBuf, PathBuf)>, mut make_container: F) -> Self
    where
        F: FnMut(&Path, &Path) -> Result<C, MovieError>,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut jobs = Vec::with_capacity(pairs.len());
        for (input, output) in pairs {
            let container = match make_container(&input, &output) {
                Ok(container) => container,
                Err(err) => {
                    warn!(input = %input.display(), error = %err, "skipping movie: failed to open container");
                    continue;
                }
            };
            let job = Arc::new(MovieJob::new(input, output));
            let orchestrator = MovieOrchestrator::new(container, job.status.clone(), cancel.clone());
            jobs.push(QueuedJob {
                job,
                orchestrator: Some(orchestrator),
            });
        }
        Self { jobs, cancel }
    }

    /// A token the CLI's `ctrlc` handler can store and flip from a signal
    /// context (spec §9: realized as an `Arc<AtomicBool>` rather than a
    /// shared `Vec` the handler walks itself).
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Mean progress across every job (spec §4.4 "recompute aggregate
    /// progress = mean of job progresses").
    pub fn aggregate_progress(&self) -> f64 {
        if self.jobs.is_empty() {
            return 1.0;
        }
        let sum: f64 = self.jobs.iter().map(|q| q.job.status.progress()).sum();
        sum / self.jobs.len() as f64
    }

    /// Set the shared cancel flag; observed by every running and
    /// not-yet-started `MovieOrchestrator` (spec §4.4 `cancelAll`).
    pub fn cancel_all(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Admission loop (spec §4.4 `run`): start up to `concurrency` jobs at a
    /// time, sleeping 2s between passes, until every job has completed.
    pub fn run(&mut self, concurrency: usize) {
        self.run_with_tick(concurrency, |_jobs| {});
    }

    /// Same admission loop as [`Self::run`], calling `on_tick` with the full
    /// job list after every admission pass — the hook a caller uses to
    /// refresh per-movie progress bars (spec §1a/§4.4) without the
    /// Scheduler itself depending on `indicatif`.
    pub fn run_with_tick<F>(&mut self, concurrency: usize, mut on_tick: F)
    where
        F: FnMut(&[Arc<MovieJob>]),
    {
        let concurrency = concurrency.max(1);
        loop {
            let running = self
                .jobs
                .iter()
                .filter(|q| q.job.status.has_started() && !q.job.status.has_completed())
                .count();
            let admit = concurrency.saturating_sub(running);

            let mut started = 0;
            for queued in self.jobs.iter_mut() {
                if started >= admit {
                    break;
                }
                if queued.job.status.has_started() {
                    continue;
                }
                if let Some(orchestrator) = queued.orchestrator.take() {
                    let path = queued.job.input.clone();
                    started += 1;
                    if let Err(err) = orchestrator.start(path.clone()) {
                        warn!(input = %path.display(), error = %err, "movie failed to start");
                    } else {
                        info!(input = %path.display(), "movie started");
                    }
                }
            }

            let job_refs: Vec<Arc<MovieJob>> = self.jobs.iter().map(|q| q.job.clone()).collect();
            on_tick(&job_refs);

            if job_refs.iter().all(|job| job.status.has_completed()) {
                break;
            }

            std::thread::sleep(Duration::from_secs(2));
        }
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Arc<MovieJob>> {
        self.jobs.iter().map(|q| &q.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::test_support::{FakeDescriptor, FakeMovieContainer, FakeTrack, VecSink, VecSource};
    use crate::container::{FieldDetail, Sample, SamplePayload};
    use crate::time::{Pts, Rational};
    use std::fs;

    fn passthrough_track() -> FakeTrack {
        FakeTrack {
            descriptor: FakeDescriptor {
                field_count: 0,
                field_detail: FieldDetail::Unknown,
                nominal_frame_rate: 0.0,
                codec_fourcc: *b"aac ",
                is_dv_ntsc: false,
                dimensions: (0, 0),
                natural_time_scale: 48_000,
                end_time: Rational::new(1, 1),
            },
            kind: crate::track::TrackKind::Audio,
            source: Some(Box::new(VecSource::new(vec![Sample {
                pts: Pts::new(0, 48_000),
                payload: SamplePayload::Opaque(vec![1, 2, 3]),
            }]))),
            sink: Some(Box::new(VecSink::new())),
            missing_descriptor: false,
        }
    }

    #[test]
    fn scan_inputs_finds_movie_files_and_mirrors_structure() {
        let dir = std::env::temp_dir().join(format!(
            "deinterlace-scan-test-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("a.mov"), b"x").unwrap();
        fs::write(dir.join("sub/b.MP4"), b"x").unwrap();
        fs::write(dir.join(".hidden.mov"), b"x").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();

        let output_root = dir.with_file_name(format!(
            "{}-out",
            dir.file_name().unwrap().to_string_lossy()
        ));
        let _ = fs::remove_dir_all(&output_root);

        let pairs = scan_inputs(&dir, Some(&output_root)).unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].0 <= pairs[1].0);
        for (_, output) in &pairs {
            assert_eq!(output.extension().unwrap(), "mov");
            assert!(output.starts_with(&output_root));
        }

        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_dir_all(&output_root);
    }

    #[test]
    fn scan_inputs_rejects_missing_root() {
        let missing = std::env::temp_dir().join("deinterlace-does-not-exist-xyz");
        let _ = fs::remove_dir_all(&missing);
        let err = scan_inputs(&missing, None).unwrap_err();
        assert!(matches!(err, ScanError::InputMissing(_)));
    }

    #[test]
    fn scheduler_runs_every_job_to_completion() {
        let pairs = vec![
            (PathBuf::from("a.mov"), PathBuf::from("out/a.mov")),
            (PathBuf::from("b.mov"), PathBuf::from("out/b.mov")),
        ];
        let mut scheduler: Scheduler<FakeMovieContainer> =
            Scheduler::new(pairs, |_input, _output| {
                Ok(FakeMovieContainer::new(vec![passthrough_track()]))
            });
        scheduler.run(2);

        for job in scheduler.jobs() {
            assert!(job.status.has_completed());
            assert!(job.status.success());
        }
        assert_eq!(scheduler.aggregate_progress(), 1.0);
    }

    #[test]
    fn cancel_all_sets_the_shared_token() {
        let pairs = vec![(PathBuf::from("a.mov"), PathBuf::from("out/a.mov"))];
        let scheduler: Scheduler<FakeMovieContainer> = Scheduler::new(pairs, |_input, _output| {
            Ok(FakeMovieContainer::new(vec![passthrough_track()]))
        });
        let token = scheduler.cancel_token();
        assert!(!token.load(Ordering::Relaxed));
        scheduler.cancel_all();
        assert!(token.load(Ordering::Relaxed));
    }
}
