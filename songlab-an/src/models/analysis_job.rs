//! Analysis job state machine
//!
//! QUEUED → RUNNING → SUCCEEDED, with FAILED and CANCELLED as the other
//! terminal states. Within RUNNING the job moves through five stages:
//! METADATA → STEM_SEPARATION → NOTE_DETECTION → LYRICS_AND_CHORDS → FINALIZE

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::music::AnalysisResult;
use super::snapshot::ProgressSnapshot;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Waiting on the dispatch queue
    Queued,
    /// Owned by a worker
    Running,
    /// All stages finished, result available
    Succeeded,
    /// Input rejected or a stage raised
    Failed,
    /// Cancelled by a client (or purged from the queue)
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// BPM, key, loudness, brightness, tags
    Metadata,
    /// Mix → instrument stems
    StemSeparation,
    /// Stems → note events
    NoteDetection,
    /// Vocals → lyrics; mix → chords; alignment
    LyricsAndChords,
    /// Assemble the final result
    Finalize,
}

impl JobStage {
    /// Fixed execution order
    pub const ALL: [JobStage; 5] = [
        JobStage::Metadata,
        JobStage::StemSeparation,
        JobStage::NoteDetection,
        JobStage::LyricsAndChords,
        JobStage::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Metadata => "metadata",
            JobStage::StemSeparation => "stem_separation",
            JobStage::NoteDetection => "note_detection",
            JobStage::LyricsAndChords => "lyrics_and_chords",
            JobStage::Finalize => "finalize",
        }
    }

    /// Progress published when the stage begins
    pub fn started_progress(&self) -> u8 {
        match self {
            JobStage::Metadata => 10,
            JobStage::StemSeparation => 25,
            JobStage::NoteDetection => 65,
            JobStage::LyricsAndChords => 85,
            JobStage::Finalize => 95,
        }
    }

    /// Progress published when the stage output lands in `partial`
    pub fn completed_progress(&self) -> u8 {
        match self {
            JobStage::Metadata => 15,
            JobStage::StemSeparation => 50,
            JobStage::NoteDetection => 75,
            JobStage::LyricsAndChords => 95,
            JobStage::Finalize => 100,
        }
    }

    pub fn started_message(&self) -> &'static str {
        match self {
            JobStage::Metadata => "Analyzing BPM and Key...",
            JobStage::StemSeparation => "Separating Stems (This takes a while)...",
            JobStage::NoteDetection => "Analyzing individual stems...",
            JobStage::LyricsAndChords => "Transcribing lyrics and detecting chords...",
            JobStage::Finalize => "Finalizing...",
        }
    }

    pub fn completed_message(&self) -> &'static str {
        match self {
            JobStage::Metadata => "Metadata complete",
            JobStage::StemSeparation => "Stems separated",
            JobStage::NoteDetection => "Notes detected",
            JobStage::LyricsAndChords => "Lyrics and chords ready",
            JobStage::Finalize => "Analysis complete!",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submitted audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Where the file lives on disk
    pub path: PathBuf,
    /// Name the client uploaded it under
    pub file_name: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
        }
    }

    /// Original file name without extension (`"song.mp3"` → `"song"`)
    ///
    /// Used as a directory name under the results folder, so only the last
    /// path component is kept and leading dots are stripped. Falls back to
    /// `"untitled"` when nothing usable remains.
    pub fn song_id(&self) -> String {
        let base = self
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim_start_matches('.');
        let stem = base.split('.').next().unwrap_or_default().trim();
        if stem.is_empty() {
            "untitled".to_string()
        } else {
            stem.to_string()
        }
    }
}

/// Persisted state of one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub job_id: Uuid,
    pub source: SourceFile,
    pub snapshot: ProgressSnapshot,
    /// Present only when SUCCEEDED
    pub result: Option<AnalysisResult>,
    /// Present only when FAILED
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on entering a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    /// Create a queued job
    pub fn new(source: SourceFile) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            source,
            snapshot: ProgressSnapshot::queued(),
            result: None,
            error: None,
            submitted_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.snapshot.state
    }

    pub fn is_terminal(&self) -> bool {
        self.snapshot.state.is_terminal()
    }

    /// Move to `new_state`, stamping `finished_at` for terminal states
    pub fn transition_to(&mut self, new_state: JobState) {
        self.snapshot.state = new_state;
        if new_state.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Seconds since submission (or until finish)
    pub fn elapsed_seconds(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.submitted_at).num_seconds().max(0) as u64
    }
}
