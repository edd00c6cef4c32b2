//! Core library for a batch video deinterlacer: the field-separation
//! kernel, per-track pipelines, per-movie orchestration, and the batch
//! scheduler that drives a directory of movies through them.
//!
//! The CLI crate (`deinterlace-cli`) owns argument parsing and process
//! wiring; this crate stays free of `clap` and knows nothing of the
//! process boundary.

pub mod broker;
pub mod config;
pub mod container;
pub mod error;
pub mod field;
pub mod ffmpeg_adapter;
pub mod joingroup;
pub mod logging;
pub mod movie;
pub mod pipeline;
pub mod progress;
pub mod time;
pub mod track;
