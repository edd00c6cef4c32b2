//! Per-movie orchestrator (component C3): build the set of track pipelines,
//! run them concurrently against one writer, track progress, report
//! completion/failure/cancellation. Spec §4.3.
//!
//! Grounded on `av1an-core/src/context.rs`'s `Av1anContext::encode_file`: a
//! worker set is built from the movie's content, run concurrently against a
//! shared writer/progress surface, joined, then reported — re-purposed here
//! from "chunks against an encoder" to "tracks against a container writer".

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::container::{MovieContainer, SimplePool};
use crate::error::{MovieError, TrackClassifyError};
use crate::joingroup::JoinGroup;
use crate::pipeline::TrackPipeline;
use crate::time::Pts;
use crate::track::{self, TrackMode};

/// Spec §3 `MovieStatus`: `hasStarted`, `hasCompleted`, `success`, plus the
/// derived `progress` (mean of per-track progress, monotone until
/// completion, clamped to 1.0 once terminal).
pub struct MovieStatus {
    has_started: AtomicBool,
    has_completed: AtomicBool,
    success: AtomicBool,
    track_progress: Mutex<Vec<Arc<Mutex<f64>>>>,
}

impl MovieStatus {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            has_started: AtomicBool::new(false),
            has_completed: AtomicBool::new(false),
            // Optimistic until a pipeline or the writer reports otherwise;
            // only ever flipped false, never back to true (see `start`'s
            // join-completion supervisor).
            success: AtomicBool::new(true),
            track_progress: Mutex::new(Vec::new()),
        })
    }

    pub fn has_started(&self) -> bool {
        self.has_started.load(Ordering::Acquire)
    }

    pub fn has_completed(&self) -> bool {
        self.has_completed.load(Ordering::Acquire)
    }

    pub fn success(&self) -> bool {
        self.success.load(Ordering::Acquire)
    }

    /// Mean of per-track progress; 1.0 once terminal (spec §3 invariant
    /// "progress=1.0 when terminal").
    pub fn progress(&self) -> f64 {
        if self.has_completed() {
            return 1.0;
        }
        let cells = self.track_progress.lock();
        if cells.is_empty() {
            return 0.0;
        }
        let sum: f64 = cells.iter().map(|cell| *cell.lock()).sum();
        (sum / cells.len() as f64).clamp(0.0, 1.0)
    }

    fn bind_track_progress(&self, cells: Vec<Arc<Mutex<f64>>>) {
        *self.track_progress.lock() = cells;
    }

    fn mark_completed(&self, success: bool) {
        self.success.store(success, Ordering::Release);
        self.has_completed.store(true, Ordering::Release);
    }
}

/// Spec §3 `MovieJob`: input path, output path, status. Owned by the
/// Scheduler; one-to-one with an Orchestrator.
pub struct MovieJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: Arc<MovieStatus>,
}

impl MovieJob {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            status: MovieStatus::new(),
        }
    }
}

/// The fixed movie timescale used for every output (spec §4.3 step 4: "a
/// fixed safe value such as 120000 is acceptable").
const MOVIE_TIME_SCALE: u32 = 120_000;

pub struct MovieOrchestrator<C: MovieContainer> {
    container: C,
    status: Arc<MovieStatus>,
    cancelled: Arc<AtomicBool>,
}

impl<C: MovieContainer + 'static> MovieOrchestrator<C> {
    /// `cancel` is shared with every other orchestrator in the batch (spec
    /// §9: "the Scheduler owns the job vector; SIGINT handler is registered
    /// with a reference to that vector (or a cancel token shared with it)")
    /// — one token, not one per movie, so a single SIGINT reaches every
    /// movie regardless of whether its orchestrator has been constructed
    /// yet.
    pub fn new(container: C, status: Arc<MovieStatus>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            container,
            status,
            cancelled: cancel,
        }
    }

    pub fn status(&self) -> Arc<MovieStatus> {
        self.status.clone()
    }

    /// Propagates to every pipeline (spec §4.3).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Spec §4.3 `start()` sequence. Re-entrant: a second call on an
    /// already-started movie is a no-op. Returns once every pipeline thread
    /// and the join-completion supervisor have been spawned; completion
    /// itself is asynchronous and observed via `status()`.
    pub fn start(mut self, movie_path: PathBuf) -> Result<(), MovieError> {
        if self
            .status
            .has_started
            .swap(true, Ordering::AcqRel)
        {
            return Ok(());
        }

        let handles = self.container.tracks();
        if handles.is_empty() {
            self.status.mark_completed(false);
            return Err(MovieError::NoTracks(movie_path));
        }

        // Step 1-3: classify every track and take its source/sink before
        // any writer session state changes.
        struct Prepared {
            index: usize,
            mode: TrackMode,
            source: Box<dyn crate::container::SampleSource>,
            sink: Box<dyn crate::container::SampleSink>,
            top_field_first: bool,
            field_duration: Option<crate::time::Rational>,
            end_time: crate::time::Rational,
            dimensions: (usize, usize),
        }

        let mut prepared = Vec::with_capacity(handles.len());
        for handle in handles {
            let descriptor = match handle.descriptor.as_deref() {
                Some(descriptor) => descriptor,
                None => {
                    let err = TrackClassifyError::MissingFormatDescriptor { index: handle.index };
                    warn!(track = handle.index, error = %err, "skipping track with no format descriptor");
                    continue;
                }
            };
            let mode = track::classify_mode(handle.kind, descriptor);
            let top_field_first = track::top_field_first(descriptor);
            let field_duration = track::field_duration(descriptor);
            let end_time = descriptor.end_time();
            let dimensions = descriptor.dimensions();
            prepared.push((handle.index, mode, top_field_first, field_duration, end_time, dimensions));
        }

        let mut prepared: Vec<Prepared> = prepared
            .into_iter()
            .map(|(index, mode, top_field_first, field_duration, end_time, dimensions)| Prepared {
                index,
                mode,
                source: self.container.take_source(index),
                sink: self.container.take_sink(index),
                top_field_first,
                field_duration,
                end_time,
                dimensions,
            })
            .collect();

        // Step 4-5.
        self.container.set_movie_time_scale(MOVIE_TIME_SCALE);
        if let Err(err) = self.container.start_reading() {
            self.status.mark_completed(false);
            return Err(MovieError::Setup {
                path: movie_path,
                message: err.to_string(),
            });
        }
        if let Err(err) = self.container.start_writing() {
            self.status.mark_completed(false);
            return Err(MovieError::Setup {
                path: movie_path,
                message: err.to_string(),
            });
        }
        if let Err(err) = self.container.start_session(Pts::zero(MOVIE_TIME_SCALE)) {
            self.status.mark_completed(false);
            return Err(MovieError::Setup {
                path: movie_path,
                message: err.to_string(),
            });
        }

        // Step 6: postWriterStart — resolve the pixel-buffer pool now that
        // the writer session exists (spec §9 "pool sometimes absent after
        // startWriting").
        let mut pipelines = Vec::with_capacity(prepared.len());
        let mut progress_cells = Vec::with_capacity(prepared.len());
        for track in prepared.drain(..) {
            let pool = if track.mode == TrackMode::DeinterlaceAndRecompress {
                let (width, height) = track.dimensions;
                let pool = self
                    .container
                    .pixel_buffer_pool(track.index, width, height)
                    .unwrap_or_else(|| Box::new(SimplePool::new(width, height)));
                Some(pool)
            } else {
                None
            };

            let pipeline = TrackPipeline::new(
                track.index,
                track.mode,
                track.source,
                track.sink,
                pool,
                track.top_field_first,
                track.field_duration,
                track.end_time,
                self.cancelled.clone(),
            );
            progress_cells.push(pipeline.progress_handle());
            pipelines.push(pipeline);
        }
        self.status.bind_track_progress(progress_cells);

        // Step 7-8: start every pipeline, then supervise the join group.
        let join_group = JoinGroup::new();
        let mut handles = Vec::with_capacity(pipelines.len());
        for pipeline in pipelines {
            join_group.enter();
            let group = join_group.clone();
            let status = self.status.clone();
            handles.push(thread::spawn(move || {
                let outcome = pipeline.run();
                if let Some(err) = &outcome.error {
                    warn!(track = outcome.track_index, error = %err, "track pipeline failed");
                }
                if !outcome.success {
                    status.success.store(false, Ordering::Release);
                }
                group.leave();
            }));
        }

        let cancelled = self.cancelled.clone();
        let status = self.status.clone();
        let mut container = self.container;
        thread::spawn(move || {
            join_group.wait();
            for handle in handles {
                let _ = handle.join();
            }
            if cancelled.load(Ordering::Relaxed) {
                container.cancel_writing();
                info!(movie = %movie_path.display(), "movie cancelled");
            } else {
                if let Err(err) = container.finish_writing() {
                    error!(movie = %movie_path.display(), error = %err, "failed to finish writing");
                    status.success.store(false, Ordering::Release);
                }
                container.cancel_reading();
            }
            // mark_completed only flips has_completed/success; success may
            // already have been pulled false by a pipeline or by the
            // finish_writing branch above, so don't stomp it back to true.
            let success = status.success.load(Ordering::Acquire) && !cancelled.load(Ordering::Relaxed);
            status.mark_completed(success);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::test_support::{
        FakeDescriptor, FakeMovieContainer, FakeTrack, VecSink, VecSource,
    };
    use crate::container::{FieldDetail, PixelBuffer, Sample, SamplePayload};
    use crate::time::Rational;

    fn video_track_with_fields() -> FakeTrack {
        FakeTrack {
            descriptor: FakeDescriptor {
                field_count: 2,
                field_detail: FieldDetail::TemporalTopFirst,
                nominal_frame_rate: 29.97,
                codec_fourcc: *b"h264",
                is_dv_ntsc: false,
                dimensions: (4, 4),
                natural_time_scale: 60_000,
                end_time: Rational::new(2002, 60_000),
            },
            kind: crate::track::TrackKind::Video,
            source: Some(Box::new(VecSource::new(vec![
                Sample {
                    pts: Pts::new(0, 60_000),
                    payload: SamplePayload::Pixels(PixelBuffer {
                        width: 4,
                        height: 4,
                        // row_bytes_for(4) == 16 (container.rs); must agree
                        // with the SimplePool geometry the Orchestrator
                        // derives from this track's (width, height), since
                        // FakeMovieContainer::pixel_buffer_pool always
                        // returns None and forces that fallback.
                        row_bytes: 16,
                        data: vec![0x10; 64],
                    }),
                },
                Sample {
                    pts: Pts::new(1001, 60_000),
                    payload: SamplePayload::Pixels(PixelBuffer {
                        width: 4,
                        height: 4,
                        row_bytes: 16,
                        data: vec![0x20; 64],
                    }),
                },
            ]))),
            sink: Some(Box::new(VecSink::new())),
            missing_descriptor: false,
        }
    }

    fn audio_track() -> FakeTrack {
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
    fn start_is_reentrant_noop() {
        let container = FakeMovieContainer::new(vec![video_track_with_fields()]);
        let status = MovieStatus::new();
        let orchestrator =
            MovieOrchestrator::new(container, status.clone(), Arc::new(AtomicBool::new(false)));
        // `start` consumes the orchestrator, but we only need to show the
        // guard flips `has_started`; calling it twice requires two
        // orchestrators sharing one status in this API shape, so we assert
        // the guard itself here instead.
        assert!(!status.has_started());
        orchestrator.start(PathBuf::from("movie.mov")).unwrap();
        assert!(status.has_started());
    }

    #[test]
    fn no_tracks_fails_movie() {
        let container = FakeMovieContainer::new(vec![]);
        let status = MovieStatus::new();
        let orchestrator =
            MovieOrchestrator::new(container, status.clone(), Arc::new(AtomicBool::new(false)));
        let result = orchestrator.start(PathBuf::from("empty.mov"));
        assert!(result.is_err());
        assert!(status.has_completed());
        assert!(!status.success());
    }

    #[test]
    fn mixed_tracks_complete_successfully() {
        let container =
            FakeMovieContainer::new(vec![video_track_with_fields(), audio_track()]);
        let status = MovieStatus::new();
        let orchestrator =
            MovieOrchestrator::new(container, status.clone(), Arc::new(AtomicBool::new(false)));
        orchestrator.start(PathBuf::from("movie.mov")).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !status.has_completed() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(status.has_completed());
        assert!(status.success());
        assert_eq!(status.progress(), 1.0);
    }

    #[test]
    fn track_with_no_format_descriptor_is_skipped_not_fatal() {
        let mut undescribed = audio_track();
        undescribed.missing_descriptor = true;
        let container = FakeMovieContainer::new(vec![video_track_with_fields(), undescribed]);
        let status = MovieStatus::new();
        let orchestrator =
            MovieOrchestrator::new(container, status.clone(), Arc::new(AtomicBool::new(false)));
        orchestrator.start(PathBuf::from("movie.mov")).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !status.has_completed() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        // The undescribed track's pipeline was never built; the movie still
        // completes successfully on the strength of the one describable track.
        assert!(status.has_completed());
        assert!(status.success());
    }
}
