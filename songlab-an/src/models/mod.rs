//! Data models for songlab-an (Song Analysis service)
//!
//! - Analysis job state machine and progress snapshots
//! - Musical artifacts (chords, key, notes, lyrics)
//! - Analysis parameters

pub mod analysis_job;
pub mod music;
pub mod parameters;
pub mod snapshot;

pub use analysis_job::{AnalysisJob, JobStage, JobState, SourceFile};
pub use music::{
    AnalysisResult, ChordSegment, KeyEstimate, KeyMode, LyricLine, LyricsData,
    MergedLyricChordLine, NoteEvent, NotesByStem, StemMap, TrackMetadata, NOTE_NAMES, NO_CHORD,
    UNKNOWN_KEY,
};
pub use parameters::AnalysisParameters;
pub use snapshot::{PartialResults, ProgressSnapshot};
