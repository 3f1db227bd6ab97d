//! DSP feature front end
//!
//! Runs a configured extractor command as `<command...> <audio>` and reads an
//! [`AudioFeatures`] JSON document from its stdout.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tracing::{debug, info};

use super::{run_command, AudioFeatures, CollaboratorError, FeatureFrontEnd};

/// Feature extraction via an external command
pub struct CommandFeatureFrontEnd {
    program: String,
    args: Vec<String>,
}

impl CommandFeatureFrontEnd {
    /// `command` may carry leading arguments, e.g. `"python3 features.py"`
    pub fn new(command: impl AsRef<str>) -> Self {
        let mut parts = command.as_ref().split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn parse_output(stdout: &[u8]) -> Result<AudioFeatures, CollaboratorError> {
        serde_json::from_slice(stdout).map_err(|e| CollaboratorError::Parse(e.to_string()))
    }
}

#[async_trait]
impl FeatureFrontEnd for CommandFeatureFrontEnd {
    async fn extract(&self, audio: &Path) -> Result<AudioFeatures, CollaboratorError> {
        if self.program.is_empty() {
            return Err(CollaboratorError::BinaryNotFound("feature extractor".to_string()));
        }

        debug!(audio_file = %audio.display(), program = %self.program, "Running feature extraction");

        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(audio.as_os_str().to_os_string());

        let output = run_command(&self.program, args).await?;
        let features = Self::parse_output(&output.stdout)?;

        info!(
            audio_file = %audio.display(),
            bpm = features.bpm,
            frames = features.chroma_frames.len(),
            "Feature extraction completed"
        );

        Ok(features)
    }
}
