//! Musical artifacts produced by an analysis job

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Pitch-class names, index 0 = C
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Label used for frames, segments and lyric lines without a chord
pub const NO_CHORD: &str = "N";

/// Estimated key when the audio has no tonal content
pub const UNKNOWN_KEY: &str = "N/A";

/// Stem name → separated audio file
pub type StemMap = BTreeMap<String, PathBuf>;

/// Stem name → transcribed notes, ordered by start time
pub type NotesByStem = BTreeMap<String, Vec<NoteEvent>>;

/// One chord-labeled time span (seconds)
///
/// Sequences are sorted by `start_time` and pairwise non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub chord_name: String,
}

impl ChordSegment {
    pub fn new(start_time: f64, end_time: f64, chord_name: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            chord_name: chord_name.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Half-open containment: `start_time <= t < end_time`
    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t < self.end_time
    }
}

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

/// One of the 24 major/minor keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Pitch class of the tonic, 0 = C
    pub root: u8,
    pub mode: KeyMode,
}

impl KeyEstimate {
    pub fn root_name(&self) -> &'static str {
        NOTE_NAMES[(self.root % 12) as usize]
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
        };
        write!(f, "{} {}", self.root_name(), mode)
    }
}

/// Transcribed note (seconds, MIDI pitch, velocity 0-1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start: f64,
    pub end: f64,
    pub pitch: u8,
    pub velocity: f32,
}

/// Timed lyric line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Lyric line annotated with the chord sounding at its start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedLyricChordLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Chord name, or [`NO_CHORD`]
    pub chord_name: String,
}

/// Lyrics as delivered in the result
///
/// Plain lines are used when no chord data was available to align against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LyricsData {
    Aligned(Vec<MergedLyricChordLine>),
    Plain(Vec<LyricLine>),
}

impl LyricsData {
    pub fn len(&self) -> usize {
        match self {
            LyricsData::Aligned(lines) => lines.len(),
            LyricsData::Plain(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LyricsData {
    fn default() -> Self {
        LyricsData::Plain(Vec::new())
    }
}

/// Track-level summary published by the metadata stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub bpm: f64,
    pub duration_seconds: f64,
    pub estimated_key: String,
    pub loudness_rms: f64,
    /// Mean spectral centroid (Hz)
    pub brightness: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Final result of a succeeded job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Original file name without extension
    pub song_id: String,
    pub metadata: TrackMetadata,
    pub chords: Vec<ChordSegment>,
    pub notes: NotesByStem,
    pub stems: StemMap,
    pub lyrics_data: LyricsData,
    /// Generated lyric sheet, when lyrics were available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics_doc: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = KeyEstimate { root: 6, mode: KeyMode::Minor };
        assert_eq!(key.to_string(), "F# minor");
        let key = KeyEstimate { root: 0, mode: KeyMode::Major };
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn test_segment_contains_is_half_open() {
        let seg = ChordSegment::new(1.0, 2.0, "C");
        assert!(seg.contains(1.0));
        assert!(seg.contains(1.999));
        assert!(!seg.contains(2.0));
        assert!(!seg.contains(0.5));
        assert_eq!(seg.duration(), 1.0);
    }

    #[test]
    fn test_lyrics_data_untagged_shapes() {
        let aligned = LyricsData::Aligned(vec![MergedLyricChordLine {
            start: 0.0,
            end: 1.0,
            text: "la".to_string(),
            chord_name: "Am".to_string(),
        }]);
        let json = serde_json::to_string(&aligned).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"chord_name\":\"Am\""));

        let plain = LyricsData::Plain(vec![LyricLine {
            start: 0.0,
            end: 1.0,
            text: "la".to_string(),
        }]);
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("chord_name"));
        assert_eq!(plain.len(), 1);
        assert!(LyricsData::default().is_empty());
    }
}
