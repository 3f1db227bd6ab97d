//! Deterministic music analysis
//!
//! Pure functions over chroma frames and timed segments. No I/O except the
//! lyric sheet writer.

pub mod chord_recognizer;
pub mod chord_templates;
pub mod key_estimator;
pub mod lyric_sheet;
pub mod lyrics_aligner;
pub mod segment_smoother;

pub use chord_recognizer::{ChordError, ChordRecognizer, FrameClock, DEFAULT_CHORD_THRESHOLD};
pub use chord_templates::{ChordQuality, ChordTemplate, ChordTemplateBank, Chroma};
pub use key_estimator::{aggregate_chroma, detect_key, estimate_key, estimate_key_with_score};
pub use lyric_sheet::{render_lyric_sheet, write_lyric_sheet};
pub use lyrics_aligner::align_lyrics;
pub use segment_smoother::{normalize_segments, smooth_segments, DEFAULT_MIN_DURATION};
