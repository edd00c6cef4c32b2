//! Per-track pipeline (component C2): classify a track, pull samples,
//! transform according to its [`TrackMode`], push to the writer.
//!
//! Spec §5 describes the pump as driven by writer back-pressure — "it pumps
//! while the writer reports ready and yields otherwise". This crate realizes
//! that as one OS thread per track (spec §9, option (a): a blocking drain on
//! a private serial queue per pipeline), looping `is_ready_for_more` with a
//! cooperative yield rather than a callback re-entering on a shared queue,
//! which has no equivalent in this stack (tracing this to `av1an-core`'s
//! `broker.rs`: each `Broker` worker is likewise a plain loop pulling and
//! processing one work item at a time, absorbing its own failures without
//! tearing down its siblings).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::{PixelBufferPool, SamplePayload, SampleSink, SampleSource};
use crate::error::PipelineError;
use crate::field::make_progressive_pair;
use crate::time::{Pts, Rational};
use crate::track::TrackMode;

enum PumpStep {
    Continue,
    Done,
}

/// Outcome of a finished pipeline, reported back to the owning
/// [`MovieOrchestrator`](crate::movie::MovieOrchestrator).
pub struct PipelineOutcome {
    pub track_index: usize,
    pub frames_written: u64,
    pub success: bool,
    pub error: Option<PipelineError>,
}

pub struct TrackPipeline {
    index: usize,
    mode: TrackMode,
    reader: Box<dyn SampleSource>,
    writer: Box<dyn SampleSink>,
    pool: Option<Box<dyn PixelBufferPool>>,
    top_field_first: bool,
    field_duration: Option<Rational>,
    end_time: Rational,
    pending: Option<(crate::container::PixelBuffer, Pts)>,
    frames_written: u64,
    progress: Arc<Mutex<f64>>,
    cancelled: Arc<AtomicBool>,
}

impl TrackPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        mode: TrackMode,
        reader: Box<dyn SampleSource>,
        writer: Box<dyn SampleSink>,
        pool: Option<Box<dyn PixelBufferPool>>,
        top_field_first: bool,
        field_duration: Option<Rational>,
        end_time: Rational,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            index,
            mode,
            reader,
            writer,
            pool,
            top_field_first,
            field_duration,
            end_time,
            pending: None,
            frames_written: 0,
            progress: Arc::new(Mutex::new(0.0)),
            cancelled,
        }
    }

    /// A clone of this pipeline's progress cell; the Orchestrator keeps one
    /// per track to compute the movie's mean progress (spec §4.3).
    pub fn progress_handle(&self) -> Arc<Mutex<f64>> {
        self.progress.clone()
    }

    /// Run the pump loop to completion on the calling thread. The
    /// Orchestrator spawns one thread per pipeline and calls this there.
    pub fn run(mut self) -> PipelineOutcome {
        loop {
            while !self.writer.is_ready_for_more() && !self.cancelled.load(Ordering::Relaxed) {
                std::thread::yield_now();
            }

            if self.cancelled.load(Ordering::Relaxed) {
                self.writer.mark_finished();
                return self.finish(false, None);
            }

            match self.pump_one() {
                Ok(PumpStep::Continue) => continue,
                Ok(PumpStep::Done) => {
                    self.writer.mark_finished();
                    return self.finish(true, None);
                }
                Err(err) => {
                    self.writer.mark_finished();
                    return self.finish(false, Some(err));
                }
            }
        }
    }

    fn finish(self, success: bool, error: Option<PipelineError>) -> PipelineOutcome {
        if success {
            *self.progress.lock() = 1.0;
        }
        PipelineOutcome {
            track_index: self.index,
            frames_written: self.frames_written,
            success: success && error.is_none(),
            error,
        }
    }

    fn pump_one(&mut self) -> Result<PumpStep, PipelineError> {
        match self.mode {
            TrackMode::DeinterlaceAndRecompress => self.pump_deinterlace(),
            // spec §9 open question: RecompressOnly is aliased to
            // PassThrough until the recompress path exists.
            TrackMode::RecompressOnly | TrackMode::PassThrough => self.pump_passthrough(),
        }
    }

    fn pump_deinterlace(&mut self) -> Result<PumpStep, PipelineError> {
        if let Some((buffer, pts)) = self.pending.take() {
            self.writer.append_pixel_buffer(buffer, pts)?;
            self.frames_written += 1;
            return Ok(PumpStep::Continue);
        }

        let sample = match self.reader.next_sample()? {
            Some(sample) => sample,
            None => return Ok(PumpStep::Done),
        };

        let src = match sample.payload {
            SamplePayload::Pixels(buffer) => buffer,
            SamplePayload::Opaque(_) => {
                return Err(PipelineError::GeometryMismatch {
                    index: self.index,
                    detail: "deinterlace track yielded a compressed sample".to_string(),
                })
            }
        };

        let pool = self.pool.as_deref().ok_or_else(|| PipelineError::GeometryMismatch {
            index: self.index,
            detail: "no pixel buffer pool bound to this track".to_string(),
        })?;
        let field_duration = self.field_duration.ok_or_else(|| PipelineError::GeometryMismatch {
            index: self.index,
            detail: "track has fields but no valid field duration".to_string(),
        })?;

        let (first, second) = make_progressive_pair(&src, self.top_field_first, pool);
        let second_pts = sample.pts.plus_duration(field_duration);

        self.writer.append_pixel_buffer(first, sample.pts)?;
        self.pending = Some((second, second_pts));
        self.frames_written += 1;

        let end = self.end_time.to_f64();
        if end > 0.0 {
            *self.progress.lock() = (sample.pts.to_f64() / end).clamp(0.0, 1.0);
        }

        Ok(PumpStep::Continue)
    }

    fn pump_passthrough(&mut self) -> Result<PumpStep, PipelineError> {
        match self.reader.next_sample()? {
            Some(sample) => {
                self.writer.append_sample(sample)?;
                self.frames_written += 1;
                Ok(PumpStep::Continue)
            }
            None => Ok(PumpStep::Done),
        }
    }
}
