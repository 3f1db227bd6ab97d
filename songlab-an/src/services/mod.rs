//! External collaborators
//!
//! The pipeline only sees these traits. Production implementations shell out
//! to the analysis tools or call the lyrics service over HTTP; tests plug in
//! fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::analysis::Chroma;
use crate::config::ServiceConfig;
use crate::models::{ChordSegment, LyricLine, NoteEvent, StemMap};

pub mod audio_file;
pub mod feature_extractor;
pub mod lyrics_client;
pub mod note_transcriber;
pub mod stem_separator;

pub use audio_file::{probe_input, read_tags, InputError, TrackTags};
pub use feature_extractor::CommandFeatureFrontEnd;
pub use lyrics_client::{DisabledLyricsService, HttpLyricsService};
pub use note_transcriber::BasicPitchTranscriber;
pub use stem_separator::DemucsSeparator;

// ============================================================================
// Errors
// ============================================================================

/// Failure of an external collaborator call
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Tool binary not found in PATH
    #[error("{0} binary not found in PATH")]
    BinaryNotFound(String),

    /// Tool could not be run or exited non-zero
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Tool output could not be parsed
    #[error("Failed to parse output: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        CollaboratorError::Http(err.to_string())
    }
}

// ============================================================================
// Data exchanged with collaborators
// ============================================================================

/// Summary features and chroma frames from the DSP front end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub bpm: f64,
    pub duration_seconds: f64,
    pub loudness_rms: f64,
    /// Mean spectral centroid (Hz)
    pub brightness: f64,
    /// Per-frame 12-bin chroma, not necessarily normalized
    #[serde(default)]
    pub chroma_frames: Vec<Chroma>,
    pub hop_length: u32,
    pub sample_rate: u32,
}

/// Track identity passed to the lyrics service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackInfo {
    pub song_id: String,
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// Chords delivered alongside the lyrics, if any
#[derive(Debug, Clone, PartialEq)]
pub enum ChordSource {
    Provided(Vec<ChordSegment>),
    Unavailable,
}

/// Lyrics service answer
#[derive(Debug, Clone, PartialEq)]
pub enum LyricsOutcome {
    Provided {
        lines: Vec<LyricLine>,
        chords: ChordSource,
    },
    Unavailable {
        reason: String,
    },
}

impl LyricsOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        LyricsOutcome::Unavailable {
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Audio → summary features + chroma frames
#[async_trait]
pub trait FeatureFrontEnd: Send + Sync {
    async fn extract(&self, audio: &Path) -> Result<AudioFeatures, CollaboratorError>;
}

/// Mix → named stems written under `out_dir`
#[async_trait]
pub trait StemSeparator: Send + Sync {
    async fn separate(&self, audio: &Path, out_dir: &Path) -> Result<StemMap, CollaboratorError>;
}

/// Stem → note events
#[async_trait]
pub trait NoteTranscriber: Send + Sync {
    async fn transcribe(&self, stem: &Path, work_dir: &Path)
        -> Result<Vec<NoteEvent>, CollaboratorError>;
}

/// Vocals → timed lyric lines (and optionally chords)
#[async_trait]
pub trait LyricsService: Send + Sync {
    async fn transcribe(
        &self,
        vocals: &Path,
        track: &TrackInfo,
    ) -> Result<LyricsOutcome, CollaboratorError>;
}

/// The full set of collaborators a pipeline runs against
#[derive(Clone)]
pub struct Collaborators {
    pub features: Arc<dyn FeatureFrontEnd>,
    pub separator: Arc<dyn StemSeparator>,
    pub transcriber: Arc<dyn NoteTranscriber>,
    pub lyrics: Arc<dyn LyricsService>,
}

impl Collaborators {
    /// Production collaborators built from configuration
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let lyrics: Arc<dyn LyricsService> = match &config.lyrics_service_url {
            Some(url) if !url.trim().is_empty() => Arc::new(HttpLyricsService::new(
                url.clone(),
                std::time::Duration::from_secs(config.lyrics_timeout_secs),
            )?),
            _ => Arc::new(DisabledLyricsService),
        };

        Ok(Self {
            features: Arc::new(CommandFeatureFrontEnd::new(config.feature_command.clone())),
            separator: Arc::new(DemucsSeparator::new(
                config.demucs_command.clone(),
                config.demucs_model.clone(),
            )),
            transcriber: Arc::new(BasicPitchTranscriber::new(config.basic_pitch_command.clone())),
            lyrics,
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Run a tool to completion off the async runtime
///
/// A missing binary maps to [`CollaboratorError::BinaryNotFound`]; a non-zero
/// exit maps to [`CollaboratorError::Execution`] carrying stderr.
pub(crate) async fn run_command(
    program: &str,
    args: Vec<std::ffi::OsString>,
) -> Result<std::process::Output, CollaboratorError> {
    let binary = program.to_string();
    let output = tokio::task::spawn_blocking(move || {
        std::process::Command::new(&binary).args(&args).output()
    })
    .await
    .map_err(|e| CollaboratorError::Execution(format!("Task join error: {}", e)))?
    .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CollaboratorError::BinaryNotFound(program.to_string())
        } else {
            CollaboratorError::Execution(e.to_string())
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CollaboratorError::Execution(format!(
            "{} exited with {:?}: {}",
            program,
            output.status.code(),
            stderr.trim()
        )));
    }

    Ok(output)
}
