//! Basic Pitch note transcription
//!
//! `basic-pitch <work_dir> <stem> --save-note-events` writes
//! `<work_dir>/<stem base>_basic_pitch.csv` with columns
//! `start_time_s,end_time_s,pitch_midi,velocity[,pitch_bend...]`.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{run_command, CollaboratorError, NoteTranscriber};
use crate::models::NoteEvent;

pub struct BasicPitchTranscriber {
    command: String,
}

impl BasicPitchTranscriber {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn csv_path(stem: &Path, work_dir: &Path) -> PathBuf {
        let base = stem
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        work_dir.join(format!("{base}_basic_pitch.csv"))
    }
}

impl Default for BasicPitchTranscriber {
    fn default() -> Self {
        Self::new("basic-pitch")
    }
}

/// Parse note events CSV, sorted by start time
///
/// Velocities above 1 are MIDI velocities and are scaled to 0-1.
pub fn parse_note_events(csv: &str) -> Result<Vec<NoteEvent>, CollaboratorError> {
    let mut notes = Vec::new();

    for (line_no, line) in csv.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("start") {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(CollaboratorError::Parse(format!(
                "line {}: expected at least 4 columns, got {}",
                line_no + 1,
                fields.len()
            )));
        }

        let number = |idx: usize| -> Result<f64, CollaboratorError> {
            fields[idx].parse::<f64>().map_err(|e| {
                CollaboratorError::Parse(format!("line {}: column {}: {}", line_no + 1, idx + 1, e))
            })
        };

        let start = number(0)?;
        let end = number(1)?;
        let pitch = number(2)?.round().clamp(0.0, 127.0) as u8;
        let mut velocity = number(3)?;
        if velocity > 1.0 {
            velocity /= 127.0;
        }

        notes.push(NoteEvent {
            start,
            end,
            pitch,
            velocity: velocity.clamp(0.0, 1.0) as f32,
        });
    }

    notes.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(notes)
}

#[async_trait]
impl NoteTranscriber for BasicPitchTranscriber {
    async fn transcribe(
        &self,
        stem: &Path,
        work_dir: &Path,
    ) -> Result<Vec<NoteEvent>, CollaboratorError> {
        tokio::fs::create_dir_all(work_dir).await?;

        let csv_path = Self::csv_path(stem, work_dir);
        // basic-pitch refuses to overwrite existing outputs
        if csv_path.exists() {
            tokio::fs::remove_file(&csv_path).await?;
        }

        let args: Vec<OsString> = vec![
            work_dir.as_os_str().to_os_string(),
            stem.as_os_str().to_os_string(),
            "--save-note-events".into(),
        ];
        run_command(&self.command, args).await?;

        let csv = tokio::fs::read_to_string(&csv_path).await?;
        let notes = parse_note_events(&csv)?;

        debug!(stem = %stem.display(), notes = notes.len(), "Transcription complete");
        Ok(notes)
    }
}
