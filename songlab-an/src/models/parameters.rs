//! Analysis parameters
//!
//! Tunables for the chord heuristics and note detection stage.

use serde::{Deserialize, Serialize};

/// Per-service analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisParameters {
    /// Minimum cosine similarity for a frame to carry a chord label (default: 0.2)
    #[serde(default = "default_chord_threshold")]
    pub chord_threshold: f32,

    /// Chord segments shorter than this are absorbed by their predecessor (default: 0.5s)
    #[serde(default = "default_min_chord_duration")]
    pub min_chord_duration: f64,

    /// Stems that receive note transcription (drums excluded by default)
    #[serde(default = "default_melodic_stems")]
    pub melodic_stems: Vec<String>,
}

fn default_chord_threshold() -> f32 {
    0.2
}

fn default_min_chord_duration() -> f64 {
    0.5
}

fn default_melodic_stems() -> Vec<String> {
    ["vocals", "bass", "piano", "guitar", "other"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            chord_threshold: default_chord_threshold(),
            min_chord_duration: default_min_chord_duration(),
            melodic_stems: default_melodic_stems(),
        }
    }
}
