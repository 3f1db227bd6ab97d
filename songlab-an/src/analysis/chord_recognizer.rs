//! Chroma-template chord recognition
//!
//! Per frame: cosine similarity against every template, argmax label, `N`
//! below the threshold. Frame labels are then run-length encoded into timed
//! segments and smoothed.

use thiserror::Error;
use tracing::debug;

use super::chord_templates::{dot, Chroma, ChordTemplateBank, SEMITONES};
use super::segment_smoother::{smooth_segments, DEFAULT_MIN_DURATION};
use crate::models::{ChordSegment, NO_CHORD};

/// Default minimum cosine similarity for a frame to get a chord label
pub const DEFAULT_CHORD_THRESHOLD: f32 = 0.2;

/// Small constant added to frame norms before dividing
const NORM_EPSILON: f32 = 1e-8;

#[derive(Debug, Error, PartialEq)]
pub enum ChordError {
    /// No chroma frames to classify
    #[error("insufficient audio for chord recognition")]
    InsufficientAudio,
}

/// Frame index → time mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    pub hop_length: u32,
    pub sample_rate: u32,
}

impl FrameClock {
    pub fn new(hop_length: u32, sample_rate: u32) -> Self {
        Self {
            hop_length,
            sample_rate,
        }
    }

    /// Seconds per frame
    pub fn hop_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.hop_length as f64 / self.sample_rate as f64
    }

    pub fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_seconds()
    }
}

impl Default for FrameClock {
    /// librosa defaults
    fn default() -> Self {
        Self::new(512, 22050)
    }
}

/// Chord recognizer over a fixed template bank
#[derive(Debug, Clone)]
pub struct ChordRecognizer {
    bank: ChordTemplateBank,
    threshold: f32,
    min_duration: f64,
}

impl ChordRecognizer {
    pub fn new(threshold: f32, min_duration: f64) -> Self {
        Self {
            bank: ChordTemplateBank::new(),
            threshold,
            min_duration,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    /// Label one frame; the frame is re-normalized first
    ///
    /// A frame with non-finite values scores NaN everywhere and gets `N`.
    pub fn label_frame(&self, frame: &Chroma) -> (&str, f32) {
        let normalized = normalize_frame(frame);
        let (template, score) = self.bank.best_match(&normalized);
        if !score.is_finite() || score < self.threshold {
            (NO_CHORD, score)
        } else {
            (template.name.as_str(), score)
        }
    }

    /// Classify frames into smoothed chord segments
    pub fn recognize(
        &self,
        frames: &[Chroma],
        clock: FrameClock,
    ) -> Result<Vec<ChordSegment>, ChordError> {
        if frames.is_empty() {
            return Err(ChordError::InsufficientAudio);
        }

        let labels: Vec<&str> = frames.iter().map(|f| self.label_frame(f).0).collect();
        let raw = run_length_encode(&labels, clock);
        let raw_count = raw.len();
        let smoothed = smooth_segments(raw, self.min_duration);

        debug!(
            frames = frames.len(),
            raw_segments = raw_count,
            segments = smoothed.len(),
            "Chord recognition complete"
        );

        Ok(smoothed)
    }
}

impl Default for ChordRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_CHORD_THRESHOLD, DEFAULT_MIN_DURATION)
    }
}

fn normalize_frame(frame: &Chroma) -> Chroma {
    let norm = dot(frame, frame).sqrt() + NORM_EPSILON;
    let mut out = [0.0f32; SEMITONES];
    for (o, x) in out.iter_mut().zip(frame.iter()) {
        *o = x / norm;
    }
    out
}

/// Collapse consecutive equal labels into segments
///
/// A run ends where the next run starts; the last run ends one hop after its
/// last frame. `N` runs and zero-length runs are dropped.
fn run_length_encode(labels: &[&str], clock: FrameClock) -> Vec<ChordSegment> {
    let mut segments = Vec::new();
    let mut run_start = 0usize;

    for i in 1..=labels.len() {
        if i < labels.len() && labels[i] == labels[run_start] {
            continue;
        }

        let label = labels[run_start];
        let start_time = clock.frame_time(run_start);
        let end_time = clock.frame_time(i);
        if label != NO_CHORD && end_time > start_time {
            segments.push(ChordSegment::new(start_time, end_time, label));
        }
        run_start = i;
    }

    segments
}
