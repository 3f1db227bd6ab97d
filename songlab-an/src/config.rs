//! Service configuration
//!
//! Resolution order: CLI flags (applied in `main`) → `SONGLAB_*` environment
//! variables → `songlab.toml` in the root folder → compiled defaults.
//! Relative directories are resolved against the root folder.

use serde::{Deserialize, Serialize};
use songlab_common::config::{load_toml, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};

use crate::models::AnalysisParameters;

pub const DEFAULT_PORT: u16 = 5741;
pub const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Concurrent analysis jobs
    pub workers: usize,
    pub uploads_dir: PathBuf,
    pub results_dir: PathBuf,
    pub max_upload_mb: usize,
    pub chord_threshold: f32,
    pub min_chord_duration: f64,
    /// Cancelling one job also drops every other queued job
    pub cancel_purges_queue: bool,
    pub feature_command: String,
    pub demucs_command: String,
    pub demucs_model: String,
    pub basic_pitch_command: String,
    pub lyrics_service_url: Option<String>,
    pub lyrics_timeout_secs: u64,
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            uploads_dir: PathBuf::from("uploads"),
            results_dir: PathBuf::from("results"),
            max_upload_mb: 200,
            chord_threshold: crate::analysis::DEFAULT_CHORD_THRESHOLD,
            min_chord_duration: crate::analysis::DEFAULT_MIN_DURATION,
            cancel_purges_queue: false,
            feature_command: "songlab-features".to_string(),
            demucs_command: "demucs".to_string(),
            demucs_model: crate::services::stem_separator::DEFAULT_MODEL.to_string(),
            basic_pitch_command: "basic-pitch".to_string(),
            lyrics_service_url: None,
            lyrics_timeout_secs: 300,
            event_capacity: 1000,
        }
    }
}

impl ServiceConfig {
    /// Load `songlab.toml` from `root_folder`, apply environment overrides
    /// and anchor relative directories at the root folder
    pub fn load(root_folder: &Path) -> songlab_common::Result<Self> {
        let path = root_folder.join(CONFIG_FILE_NAME);
        let mut config = match load_toml::<ServiceConfig>(&path)? {
            Some(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration file");
                config
            }
            None => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                ServiceConfig::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.resolve_dirs(root_folder);
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `SONGLAB_*` variables returned by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(raw: Option<String>, key: &str) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
                    None
                }
            }
        }

        if let Some(v) = lookup("SONGLAB_HOST") {
            self.host = v;
        }
        if let Some(v) = parsed(lookup("SONGLAB_PORT"), "SONGLAB_PORT") {
            self.port = v;
        }
        if let Some(v) = parsed(lookup("SONGLAB_WORKERS"), "SONGLAB_WORKERS") {
            self.workers = v;
        }
        if let Some(v) = lookup("SONGLAB_UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SONGLAB_RESULTS_DIR") {
            self.results_dir = PathBuf::from(v);
        }
        if let Some(v) = parsed(lookup("SONGLAB_CANCEL_PURGES_QUEUE"), "SONGLAB_CANCEL_PURGES_QUEUE") {
            self.cancel_purges_queue = v;
        }
        if let Some(v) = lookup("SONGLAB_LYRICS_URL") {
            self.lyrics_service_url = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("SONGLAB_FEATURE_COMMAND") {
            self.feature_command = v;
        }
    }

    /// Anchor relative upload/result directories at `root_folder`
    pub fn resolve_dirs(&mut self, root_folder: &Path) {
        if self.uploads_dir.is_relative() {
            self.uploads_dir = root_folder.join(&self.uploads_dir);
        }
        if self.results_dir.is_relative() {
            self.results_dir = root_folder.join(&self.results_dir);
        }
    }

    pub fn validate(&self) -> songlab_common::Result<()> {
        if !(0.0..=1.0).contains(&self.chord_threshold) {
            return Err(songlab_common::Error::Config(format!(
                "chord_threshold must be within 0-1, got {}",
                self.chord_threshold
            )));
        }
        if self.min_chord_duration < 0.0 {
            return Err(songlab_common::Error::Config(
                "min_chord_duration must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parameters(&self) -> AnalysisParameters {
        AnalysisParameters {
            chord_threshold: self.chord_threshold,
            min_chord_duration: self.min_chord_duration,
            ..AnalysisParameters::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 5741);
        assert_eq!(config.workers, 2);
        assert!(!config.cancel_purges_queue);
        assert_eq!(config.demucs_model, "htdemucs_6s");
        assert!(config.lyrics_service_url.is_none());
    }

    #[test]
    fn test_load_from_root_folder() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "port = 6000\ncancel_purges_queue = true\nresults_dir = \"/srv/results\"\n",
        )
        .unwrap();

        let config = ServiceConfig::load(root.path()).unwrap();

        assert_eq!(config.port, 6000);
        assert!(config.cancel_purges_queue);
        assert_eq!(config.results_dir, PathBuf::from("/srv/results"));
        assert_eq!(config.uploads_dir, root.path().join("uploads"));
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE_NAME), "port = \"nope\"").unwrap();
        let err = ServiceConfig::load(root.path()).unwrap_err();
        assert!(matches!(err, songlab_common::Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SONGLAB_PORT", "7001"),
            ("SONGLAB_WORKERS", "not-a-number"),
            ("SONGLAB_LYRICS_URL", "http://localhost:9000/lyrics"),
            ("SONGLAB_CANCEL_PURGES_QUEUE", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 7001);
        assert_eq!(config.workers, 2);
        assert!(config.cancel_purges_queue);
        assert_eq!(
            config.lyrics_service_url.as_deref(),
            Some("http://localhost:9000/lyrics")
        );
    }

    #[test]
    fn test_threshold_validation() {
        let config = ServiceConfig {
            chord_threshold: 1.5,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
