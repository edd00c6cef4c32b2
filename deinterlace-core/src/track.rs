//! Track introspection (component C5) and mode classification (part of C2).
//!
//! Pure functions over a [`FormatDescriptor`]; spec §4.5.

use crate::container::{FieldDetail, FormatDescriptor};
use crate::time::Rational;

/// ProRes family four-character codes (spec §4.2, §4.5).
const PRORES_FOURCCS: [[u8; 4]; 6] = [
    *b"apcn", *b"apch", *b"apcs", *b"apco", *b"ap4h", *b"ap4x",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
    Timecode,
    Other,
}

/// `hasFields`: true if the descriptor advertises two fields, or the codec
/// is DV-NTSC (spec §4.5 — "the descriptor lies, but DV-NTSC is always
/// interlaced").
pub fn has_fields(descriptor: &dyn FormatDescriptor) -> bool {
    descriptor.field_count() == 2 || descriptor.is_dv_ntsc()
}

/// `topFieldFirst`: spec §4.5.
pub fn top_field_first(descriptor: &dyn FormatDescriptor) -> bool {
    matches!(
        descriptor.field_detail(),
        FieldDetail::TemporalTopFirst | FieldDetail::SpatialFirstLineEarly
    )
}

/// `fieldDuration`: `None` when the track has no fields, or its nominal
/// frame rate isn't one of the two recognized cadences (spec §4.5).
pub fn field_duration(descriptor: &dyn FormatDescriptor) -> Option<Rational> {
    if !has_fields(descriptor) {
        return None;
    }
    let rate = descriptor.nominal_frame_rate();
    if rate > 29.95 && rate < 30.0 {
        Some(Rational::new(1001, 60_000))
    } else if rate > 59.90 && rate < 60.0 {
        Some(Rational::new(1001, 120_000))
    } else {
        None
    }
}

/// `isAnyProRes`: spec §4.5.
pub fn is_any_pro_res(codec_fourcc: [u8; 4]) -> bool {
    PRORES_FOURCCS.contains(&codec_fourcc)
}

/// Per-track processing mode (spec §3 `TrackMode`, §4.2 selection rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    DeinterlaceAndRecompress,
    /// Video without fields, non-ProRes. Spec §9 open question: this should
    /// re-encode to ProRes 422 but the recompress path isn't implemented
    /// yet, so the pump treats it exactly like `PassThrough` (see
    /// `pipeline.rs`). The variant is kept distinct so the classification
    /// itself stays observable and testable.
    RecompressOnly,
    PassThrough,
}

/// `TrackMode` selection (spec §4.2).
pub fn classify_mode(kind: TrackKind, descriptor: &dyn FormatDescriptor) -> TrackMode {
    if kind != TrackKind::Video {
        return TrackMode::PassThrough;
    }
    if has_fields(descriptor) {
        return TrackMode::DeinterlaceAndRecompress;
    }
    if is_any_pro_res(descriptor.codec_fourcc()) {
        TrackMode::PassThrough
    } else {
        TrackMode::RecompressOnly
    }
}
