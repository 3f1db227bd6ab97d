//! Input validation and tag reading
//!
//! Validation runs before a job enters RUNNING: the file must exist, be
//! non-empty and sniff as audio. Tags are best effort.

use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;
use thiserror::Error;

/// Input rejected before any stage runs
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("Audio file is empty: {0}")]
    Empty(String),

    #[error("Not a recognized audio file: {0}")]
    NotAudio(String),

    #[error("Failed to read input: {0}")]
    Unreadable(String),
}

/// Check the submitted file before analysis
pub async fn probe_input(path: &Path) -> Result<(), InputError> {
    let path_str = path.display().to_string();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(InputError::NotFound(path_str)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(InputError::NotFound(path_str))
        }
        Err(e) => return Err(InputError::Unreadable(e.to_string())),
    };

    if metadata.len() == 0 {
        return Err(InputError::Empty(path_str));
    }

    let owned = path.to_path_buf();
    let kind = tokio::task::spawn_blocking(move || infer::get_from_path(owned))
        .await
        .map_err(|e| InputError::Unreadable(format!("Task join error: {}", e)))?
        .map_err(|e| InputError::Unreadable(e.to_string()))?;

    match kind {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Audio => {
            tracing::debug!(file = %path_str, mime = kind.mime_type(), "Input recognized as audio");
            Ok(())
        }
        _ => Err(InputError::NotAudio(path_str)),
    }
}

/// Artist/title from the file's tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// Read artist/title; unreadable or untagged files give empty tags
pub fn read_tags(path: &Path) -> TrackTags {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(file = %path.display(), error = %e, "No readable tags");
            return TrackTags::default();
        }
    };

    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return TrackTags::default();
    };

    TrackTags {
        artist: tag.artist().map(|s| s.to_string()),
        title: tag.title().map(|s| s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..800 {
            writer.write_sample(((i % 40) as i16 - 20) * 500).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = probe_input(Path::new("/nonexistent/song.wav")).await.unwrap_err();
        assert!(matches!(err, InputError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(probe_input(&path).await, Err(InputError::Empty(_))));
    }

    #[tokio::test]
    async fn test_text_file_is_not_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp3");
        std::fs::write(&path, b"definitely not audio data").unwrap();
        assert!(matches!(probe_input(&path).await, Err(InputError::NotAudio(_))));
    }

    #[tokio::test]
    async fn test_wav_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path);
        probe_input(&path).await.unwrap();
    }

    #[test]
    fn test_untagged_wav_has_no_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path);
        assert_eq!(read_tags(&path), TrackTags::default());
    }

    #[test]
    fn test_unreadable_file_has_no_tags() {
        assert_eq!(read_tags(Path::new("/nonexistent.flac")), TrackTags::default());
    }
}
