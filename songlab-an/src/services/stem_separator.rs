//! Demucs source separation
//!
//! `demucs -n <model> --out <dir> <file>` writes one WAV per stem to
//! `<dir>/<model>/<file base name>/<stem>.wav`.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{run_command, CollaboratorError, StemSeparator};
use crate::models::StemMap;

/// Stems produced by the six-source model
pub const SIX_STEMS: [&str; 6] = ["vocals", "bass", "drums", "piano", "guitar", "other"];

pub const DEFAULT_MODEL: &str = "htdemucs_6s";

pub struct DemucsSeparator {
    command: String,
    model: String,
}

impl DemucsSeparator {
    pub fn new(command: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
        }
    }

    /// Directory demucs writes the stems of `audio` into
    pub fn track_dir(&self, audio: &Path, out_dir: &Path) -> PathBuf {
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let base = file_name.split('.').next().unwrap_or_default().to_string();
        out_dir.join(&self.model).join(base)
    }

    /// Stems found on disk; missing ones are left out
    fn collect_stems(track_dir: &Path) -> StemMap {
        let mut stems = StemMap::new();
        for stem in SIX_STEMS {
            let path = track_dir.join(format!("{stem}.wav"));
            if path.exists() {
                stems.insert(stem.to_string(), path);
            } else {
                warn!(stem, path = %path.display(), "Stem missing after separation");
            }
        }
        stems
    }
}

impl Default for DemucsSeparator {
    fn default() -> Self {
        Self::new("demucs", DEFAULT_MODEL)
    }
}

#[async_trait]
impl StemSeparator for DemucsSeparator {
    async fn separate(&self, audio: &Path, out_dir: &Path) -> Result<StemMap, CollaboratorError> {
        tokio::fs::create_dir_all(out_dir).await?;

        info!(
            audio_file = %audio.display(),
            model = %self.model,
            "Starting stem separation"
        );

        let args: Vec<OsString> = vec![
            "-n".into(),
            self.model.clone().into(),
            "--out".into(),
            out_dir.as_os_str().to_os_string(),
            audio.as_os_str().to_os_string(),
        ];
        run_command(&self.command, args).await?;

        let stems = Self::collect_stems(&self.track_dir(audio, out_dir));
        if stems.is_empty() {
            return Err(CollaboratorError::Execution(
                "separation produced no stems".to_string(),
            ));
        }

        info!(stems = stems.len(), "Stem separation complete");
        Ok(stems)
    }
}
