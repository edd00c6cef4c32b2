use std::path::PathBuf;

use thiserror::Error;

/// Errors from the batch-level directory scan (spec: "Scan failure", "No work").
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input path does not exist: {0}")]
    InputMissing(PathBuf),

    #[error("input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("no movie files found beneath {0}")]
    Empty(PathBuf),

    #[error("failed to create output directory {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk input tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A track's format descriptor was unavailable at setup time (spec §7
/// "Track classification failure"). Caught per-track inside
/// `MovieOrchestrator::start`; only skips that one track's pipeline.
#[derive(Debug, Error)]
pub enum TrackClassifyError {
    #[error("track {index} has no format descriptor")]
    MissingFormatDescriptor { index: usize },
}

/// Errors from the reader/writer collaborators, surfaced through [`SampleSource`]
/// and [`SampleSink`] (see `container.rs`).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read sample from track {track}: {source}")]
    Io {
        track: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("demux error on track {track}: {message}")]
    Demux { track: usize, message: String },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write sample to track {track}: {source}")]
    Io {
        track: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("mux error on track {track}: {message}")]
    Mux { track: usize, message: String },
}

/// Errors from a single [`TrackPipeline`](crate::pipeline::TrackPipeline) pump loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("track {index} geometry mismatch between source pixel buffer and pool: {detail}")]
    GeometryMismatch { index: usize, detail: String },
}

/// Errors from [`MovieOrchestrator::start`](crate::movie::MovieOrchestrator::start).
#[derive(Debug, Error)]
pub enum MovieError {
    #[error("movie {0} has no tracks")]
    NoTracks(PathBuf),

    #[error("failed to set up movie {path}: {message}")]
    Setup { path: PathBuf, message: String },
}
