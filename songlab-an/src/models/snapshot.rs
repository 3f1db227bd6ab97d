//! Progress snapshots and partial results
//!
//! A snapshot is replaced as a whole on every publish; readers never see a
//! half-updated value.

use serde::{Deserialize, Serialize};

use super::analysis_job::{JobStage, JobState};
use super::music::{ChordSegment, LyricsData, NotesByStem, StemMap, TrackMetadata};

/// Outputs of the stages completed so far
///
/// One explicit optional field per category instead of a loosely keyed map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrackMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stems: Option<StemMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<NotesByStem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chords: Option<Vec<ChordSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<LyricsData>,
}

impl PartialResults {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none()
            && self.stems.is_none()
            && self.notes.is_none()
            && self.chords.is_none()
            && self.lyrics.is_none()
    }

    /// Union with `earlier`: fields missing here are filled from it, fields
    /// present here win. Nothing present in either input is lost.
    pub fn absorb(&mut self, earlier: &PartialResults) {
        if self.metadata.is_none() {
            self.metadata = earlier.metadata.clone();
        }
        if self.stems.is_none() {
            self.stems = earlier.stems.clone();
        }
        if self.notes.is_none() {
            self.notes = earlier.notes.clone();
        }
        if self.chords.is_none() {
            self.chords = earlier.chords.clone();
        }
        if self.lyrics.is_none() {
            self.lyrics = earlier.lyrics.clone();
        }
    }

    /// Names of the categories present, in pipeline order
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.metadata.is_some() {
            keys.push("metadata");
        }
        if self.stems.is_some() {
            keys.push("stems");
        }
        if self.notes.is_some() {
            keys.push("notes");
        }
        if self.chords.is_some() {
            keys.push("chords");
        }
        if self.lyrics.is_some() {
            keys.push("lyrics");
        }
        keys
    }
}

/// Immutable view of a job's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub state: JobState,
    pub stage: Option<JobStage>,
    /// 0-100, never decreasing for a job
    pub progress: u8,
    pub status_message: String,
    pub partial: PartialResults,
}

impl ProgressSnapshot {
    pub fn queued() -> Self {
        Self {
            state: JobState::Queued,
            stage: None,
            progress: 0,
            status_message: "Pending...".to_string(),
            partial: PartialResults::default(),
        }
    }
}
