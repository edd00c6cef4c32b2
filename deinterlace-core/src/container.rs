//! The external collaborator seam named in spec §6: a container demuxer/muxer
//! and codec stack is assumed, not built here. Everything downstream of this
//! module talks only to these traits; `ffmpeg_adapter` is the one concrete
//! implementation, and `test_support` provides in-memory fakes for the rest
//! of the crate's test suite.

use crate::error::{SinkError, SourceError};
use crate::time::{Pts, Rational};

/// Row-major planar image, 2 bytes per pixel (422 Y'CbCr 8-bit). Spec §3.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    /// A multiple of 16; always `>= width * 2`.
    pub row_bytes: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new_zeroed(width: usize, height: usize) -> Self {
        let row_bytes = row_bytes_for(width);
        Self {
            width,
            height,
            row_bytes,
            data: vec![0u8; row_bytes * height],
        }
    }
}

/// Round `width * 2` bytes-per-pixel up to the next multiple of 16, per
/// spec §3's `PixelBuffer` invariant.
pub fn row_bytes_for(width: usize) -> usize {
    let raw = width * 2;
    (raw + 15) / 16 * 16
}

/// Allocator handing out fixed-geometry [`PixelBuffer`]s (spec §3, §6).
pub trait PixelBufferPool: Send + Sync {
    fn create_pixel_buffer(&self) -> PixelBuffer;
}

/// A fixed-geometry pool over `new_zeroed`, the only pool shape this crate
/// needs: every buffer in a track shares one `(width, height)`.
pub struct SimplePool {
    width: usize,
    height: usize,
}

impl SimplePool {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl PixelBufferPool for SimplePool {
    fn create_pixel_buffer(&self) -> PixelBuffer {
        PixelBuffer::new_zeroed(self.width, self.height)
    }
}

/// One sample pulled from a track: either an opaque compressed payload
/// (pass-through tracks) or an uncompressed pixel buffer (video-with-fields
/// tracks feeding the deinterlacer).
#[derive(Debug, Clone)]
pub enum SamplePayload {
    Opaque(Vec<u8>),
    Pixels(PixelBuffer),
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub pts: Pts,
    pub payload: SamplePayload,
}

/// Per-track sample source (spec §6 "Reader").
pub trait SampleSource: Send {
    /// Pull the next sample, or `None` at end of track.
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError>;

    /// Stop pulling; called on cancellation.
    fn cancel(&mut self);
}

/// Per-track sample sink (spec §6 "Writer", restricted to the per-track
/// surface; movie-wide session control lives on [`MovieWriter`]).
pub trait SampleSink: Send {
    fn is_ready_for_more(&self) -> bool;
    fn append_sample(&mut self, sample: Sample) -> Result<(), SinkError>;
    fn append_pixel_buffer(&mut self, buffer: PixelBuffer, pts: Pts) -> Result<(), SinkError>;
    fn mark_finished(&mut self);
}

/// Movie-wide writer session control (spec §4.3, §6).
pub trait MovieWriter {
    fn set_movie_time_scale(&mut self, scale: u32);
    fn start_writing(&mut self) -> Result<(), SinkError>;
    fn start_session(&mut self, at: Pts) -> Result<(), SinkError>;
    fn finish_writing(&mut self) -> Result<(), SinkError>;
    fn cancel_writing(&mut self);
}

/// Metadata about one track, resolved once at movie setup (spec §4.3 step
/// 1 "Load all tracks from input"). `descriptor` is `None` when the
/// container could not describe the track at all (spec §7 "Track
/// classification failure") — the Orchestrator skips such a track's
/// pipeline entirely rather than failing the whole movie.
pub struct TrackDescriptorHandle {
    pub index: usize,
    pub kind: crate::track::TrackKind,
    pub descriptor: Option<Box<dyn FormatDescriptor + Send>>,
}

/// The movie-level collaborator: track enumeration plus the writer session
/// control named in spec §4.3 and §6. One `MovieContainer` is bound to one
/// input/output pair.
///
/// `take_source`/`take_sink` are called once per track during setup, after
/// which the container only needs to answer movie-level session calls —
/// this mirrors spec §4.3 step 3 ("add each reader/writer endpoint to
/// reader and writer") without requiring the trait to hand out one
/// long-lived borrow per track.
pub trait MovieContainer: Send {
    fn tracks(&self) -> &[TrackDescriptorHandle];
    fn take_source(&mut self, track_index: usize) -> Box<dyn SampleSource>;
    fn take_sink(&mut self, track_index: usize) -> Box<dyn SampleSink>;

    fn set_movie_time_scale(&mut self, scale: u32);
    fn start_reading(&mut self) -> Result<(), SourceError>;
    fn start_writing(&mut self) -> Result<(), SinkError>;
    fn start_session(&mut self, at: Pts) -> Result<(), SinkError>;
    fn finish_writing(&mut self) -> Result<(), SinkError>;
    fn cancel_writing(&mut self);
    fn cancel_reading(&mut self);

    /// Resolve the pixel-buffer pool for a video-with-fields track, called
    /// only after `start_writing` (spec §9: "some writers only expose their
    /// pixel-buffer pool after startWriting"). `None` tells the Orchestrator
    /// to fall back to its own `SimplePool` (spec §9 fallback rule).
    fn pixel_buffer_pool(
        &mut self,
        track_index: usize,
        width: usize,
        height: usize,
    ) -> Option<Box<dyn PixelBufferPool>>;
}

/// A format descriptor, abstracted just enough for C5's pure functions
/// (spec §4.5) and C2's mode classification (spec §4.2) to operate on it.
pub trait FormatDescriptor: Send {
    fn field_count(&self) -> u32;
    fn field_detail(&self) -> FieldDetail;
    fn nominal_frame_rate(&self) -> f64;
    /// Four-character codec code, e.g. `*b"apch"`.
    fn codec_fourcc(&self) -> [u8; 4];
    fn is_dv_ntsc(&self) -> bool;
    fn dimensions(&self) -> (usize, usize);
    fn natural_time_scale(&self) -> u32;
    fn end_time(&self) -> Rational;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDetail {
    TemporalTopFirst,
    TemporalBottomFirst,
    SpatialFirstLineEarly,
    SpatialFirstLineLate,
    Unknown,
}

/// In-memory fakes for the container traits, used by the rest of the
/// crate's unit/integration tests (spec §1d: "the track pipeline, movie
/// orchestrator, and batch scheduler are tested against in-memory fakes").
#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A pool that always returns buffers matching one fixed geometry.
    pub struct FixedPool {
        width: usize,
        height: usize,
        row_bytes: usize,
    }

    impl FixedPool {
        pub fn matching(buf: &PixelBuffer) -> Self {
            Self {
                width: buf.width,
                height: buf.height,
                row_bytes: buf.row_bytes,
            }
        }
    }

    impl PixelBufferPool for FixedPool {
        fn create_pixel_buffer(&self) -> PixelBuffer {
            PixelBuffer {
                width: self.width,
                height: self.height,
                row_bytes: self.row_bytes,
                data: vec![0u8; self.row_bytes * self.height],
            }
        }
    }

    /// A reader over a fixed, pre-built list of samples.
    pub struct VecSource {
        samples: std::vec::IntoIter<Sample>,
        cancelled: bool,
    }

    impl VecSource {
        pub fn new(samples: Vec<Sample>) -> Self {
            Self {
                samples: samples.into_iter(),
                cancelled: false,
            }
        }
    }

    impl SampleSource for VecSource {
        fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
            if self.cancelled {
                return Ok(None);
            }
            Ok(self.samples.next())
        }

        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    /// A sink that records everything appended to it, always reporting
    /// ready (no artificial back-pressure) unless told otherwise.
    pub struct VecSink {
        pub appended: Mutex<Vec<Sample>>,
        pub finished: Mutex<bool>,
        ready: bool,
    }

    impl VecSink {
        pub fn new() -> Self {
            Self {
                appended: Mutex::new(Vec::new()),
                finished: Mutex::new(false),
                ready: true,
            }
        }

        pub fn not_ready() -> Self {
            Self {
                appended: Mutex::new(Vec::new()),
                finished: Mutex::new(false),
                ready: false,
            }
        }
    }

    impl Default for VecSink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SampleSink for VecSink {
        fn is_ready_for_more(&self) -> bool {
            self.ready
        }

        fn append_sample(&mut self, sample: Sample) -> Result<(), SinkError> {
            self.appended.lock().unwrap().push(sample);
            Ok(())
        }

        fn append_pixel_buffer(&mut self, buffer: PixelBuffer, pts: Pts) -> Result<(), SinkError> {
            self.appended.lock().unwrap().push(Sample {
                pts,
                payload: SamplePayload::Pixels(buffer),
            });
            Ok(())
        }

        fn mark_finished(&mut self) {
            *self.finished.lock().unwrap() = true;
        }
    }

    #[derive(Clone)]
    pub struct FakeDescriptor {
        pub field_count: u32,
        pub field_detail: FieldDetail,
        pub nominal_frame_rate: f64,
        pub codec_fourcc: [u8; 4],
        pub is_dv_ntsc: bool,
        pub dimensions: (usize, usize),
        pub natural_time_scale: u32,
        pub end_time: Rational,
    }

    impl FormatDescriptor for FakeDescriptor {
        fn field_count(&self) -> u32 {
            self.field_count
        }

        fn field_detail(&self) -> FieldDetail {
            self.field_detail
        }

        fn nominal_frame_rate(&self) -> f64 {
            self.nominal_frame_rate
        }

        fn codec_fourcc(&self) -> [u8; 4] {
            self.codec_fourcc
        }

        fn is_dv_ntsc(&self) -> bool {
            self.is_dv_ntsc
        }

        fn dimensions(&self) -> (usize, usize) {
            self.dimensions
        }

        fn natural_time_scale(&self) -> u32 {
            self.natural_time_scale
        }

        fn end_time(&self) -> Rational {
            self.end_time
        }
    }

    /// A track's fake source/sink, built up front by the test and handed
    /// out once via `take_source`/`take_sink`.
    pub struct FakeTrack {
        pub descriptor: FakeDescriptor,
        pub kind: crate::track::TrackKind,
        pub source: Option<Box<dyn SampleSource>>,
        pub sink: Option<Box<dyn SampleSink>>,
        /// When true, the container reports no format descriptor for this
        /// track at all (spec §7 "Track classification failure").
        pub missing_descriptor: bool,
    }

    pub struct FakeMovieContainer {
        handles: Vec<TrackDescriptorHandle>,
        tracks: Vec<FakeTrack>,
        pub movie_time_scale: Option<u32>,
        pub started_reading: bool,
        pub started_writing: bool,
        pub finished_writing: bool,
        pub cancelled_writing: bool,
        pub cancelled_reading: bool,
    }

    impl FakeMovieContainer {
        pub fn new(tracks: Vec<FakeTrack>) -> Self {
            let handles = tracks
                .iter()
                .enumerate()
                .map(|(index, track)| TrackDescriptorHandle {
                    index,
                    kind: track.kind,
                    descriptor: if track.missing_descriptor {
                        None
                    } else {
                        Some(Box::new(track.descriptor.clone()))
                    },
                })
                .collect();
            Self {
                handles,
                tracks,
                movie_time_scale: None,
                started_reading: false,
                started_writing: false,
                finished_writing: false,
                cancelled_writing: false,
                cancelled_reading: false,
            }
        }
    }

    impl MovieContainer for FakeMovieContainer {
        fn tracks(&self) -> &[TrackDescriptorHandle] {
            &self.handles
        }

        fn take_source(&mut self, track_index: usize) -> Box<dyn SampleSource> {
            self.tracks[track_index]
                .source
                .take()
                .expect("source already taken")
        }

        fn take_sink(&mut self, track_index: usize) -> Box<dyn SampleSink> {
            self.tracks[track_index]
                .sink
                .take()
                .expect("sink already taken")
        }

        fn set_movie_time_scale(&mut self, scale: u32) {
            self.movie_time_scale = Some(scale);
        }

        fn start_reading(&mut self) -> Result<(), SourceError> {
            self.started_reading = true;
            Ok(())
        }

        fn start_writing(&mut self) -> Result<(), SinkError> {
            self.started_writing = true;
            Ok(())
        }

        fn start_session(&mut self, _at: Pts) -> Result<(), SinkError> {
            Ok(())
        }

        fn finish_writing(&mut self) -> Result<(), SinkError> {
            self.finished_writing = true;
            Ok(())
        }

        fn cancel_writing(&mut self) {
            self.cancelled_writing = true;
        }

        fn cancel_reading(&mut self) {
            self.cancelled_reading = true;
        }

        fn pixel_buffer_pool(
            &mut self,
            _track_index: usize,
            _width: usize,
            _height: usize,
        ) -> Option<Box<dyn PixelBufferPool>> {
            None // forces the Orchestrator's SimplePool fallback (spec §9)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_bytes_rounds_up_to_multiple_of_16() {
        assert_eq!(row_bytes_for(4), 16); // 4*2=8 -> rounds to 16
        assert_eq!(row_bytes_for(8), 16); // 8*2=16 -> already aligned
        assert_eq!(row_bytes_for(9), 32); // 9*2=18 -> rounds to 32
    }
}
