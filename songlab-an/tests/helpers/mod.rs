//! Shared fixtures for songlab-an integration tests
//!
//! Fake collaborators, a WAV generator and service builders.

#![allow(dead_code)]

use async_trait::async_trait;
use songlab_an::analysis::Chroma;
use songlab_an::config::ServiceConfig;
use songlab_an::models::{ChordSegment, LyricLine, NoteEvent, StemMap};
use songlab_an::pipeline::AnalysisService;
use songlab_an::services::{
    AudioFeatures, ChordSource, CollaboratorError, Collaborators, FeatureFrontEnd, LyricsOutcome,
    LyricsService, NoteTranscriber, StemSeparator, TrackInfo,
};
use songlab_common::events::EventBus;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const ALL_STEMS: [&str; 6] = ["vocals", "bass", "drums", "piano", "guitar", "other"];

/// Write a short 440 Hz mono WAV
pub fn write_test_wav(path: &Path, seconds: f64) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (seconds * spec.sample_rate as f64) as usize;
    for i in 0..total {
        let t = i as f64 / spec.sample_rate as f64;
        let sample = (t * 440.0 * 2.0 * std::f64::consts::PI).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f64) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path.to_path_buf()
}

/// Chroma frame with energy on the given pitch classes
pub fn chroma(pitch_classes: &[usize]) -> Chroma {
    let mut frame = [0.0f32; 12];
    for pc in pitch_classes {
        frame[*pc] = 1.0;
    }
    frame
}

/// 8 frames of C major then 8 of G major, 0.25 s per frame
pub fn c_then_g_features() -> AudioFeatures {
    let mut frames = vec![chroma(&[0, 4, 7]); 8];
    frames.extend(vec![chroma(&[7, 11, 2]); 8]);
    AudioFeatures {
        bpm: 120.004,
        duration_seconds: 4.0,
        loudness_rms: 0.123456,
        brightness: 1834.567,
        chroma_frames: frames,
        hop_length: 512,
        sample_rate: 2048,
    }
}

/// Blocks a collaborator call until released
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

// ============================================================================
// Fake collaborators
// ============================================================================

pub struct FakeFeatures {
    pub features: AudioFeatures,
    pub fail: bool,
}

#[async_trait]
impl FeatureFrontEnd for FakeFeatures {
    async fn extract(&self, _audio: &Path) -> Result<AudioFeatures, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Execution("extractor crashed".to_string()));
        }
        Ok(self.features.clone())
    }
}

/// Writes a small WAV for each stem into `out_dir`
pub struct FakeSeparator {
    pub stems: Vec<&'static str>,
    pub fail: bool,
    pub gate: Option<Arc<Gate>>,
    pub calls: AtomicUsize,
}

impl FakeSeparator {
    pub fn new() -> Self {
        Self {
            stems: ALL_STEMS.to_vec(),
            fail: false,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StemSeparator for FakeSeparator {
    async fn separate(&self, _audio: &Path, out_dir: &Path) -> Result<StemMap, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.fail {
            return Err(CollaboratorError::Execution("demucs exited with 1".to_string()));
        }

        std::fs::create_dir_all(out_dir)?;
        let mut stems = StemMap::new();
        for stem in &self.stems {
            let path = write_test_wav(&out_dir.join(format!("{stem}.wav")), 0.1);
            stems.insert(stem.to_string(), path);
        }
        Ok(stems)
    }
}

/// Returns one note per call; fails for the stems listed in `fail_for`
pub struct FakeTranscriber {
    pub fail_for: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self {
            fail_for: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NoteTranscriber for FakeTranscriber {
    async fn transcribe(
        &self,
        stem: &Path,
        _work_dir: &Path,
    ) -> Result<Vec<NoteEvent>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = stem
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_for.iter().any(|f| *f == name) {
            return Err(CollaboratorError::Execution(format!("basic-pitch failed on {name}")));
        }
        Ok(vec![NoteEvent {
            start: 0.0,
            end: 0.5,
            pitch: 60,
            velocity: 0.8,
        }])
    }
}

pub enum FakeLyricsMode {
    Outcome(LyricsOutcome),
    Error,
}

pub struct FakeLyrics {
    pub mode: FakeLyricsMode,
}

impl FakeLyrics {
    pub fn lines() -> Vec<LyricLine> {
        vec![
            LyricLine {
                start: 0.5,
                end: 1.5,
                text: "first line".to_string(),
            },
            LyricLine {
                start: 2.5,
                end: 3.5,
                text: "second line".to_string(),
            },
        ]
    }

    pub fn lines_only() -> Self {
        Self {
            mode: FakeLyricsMode::Outcome(LyricsOutcome::Provided {
                lines: Self::lines(),
                chords: ChordSource::Unavailable,
            }),
        }
    }

    pub fn with_chords(chords: Vec<ChordSegment>) -> Self {
        Self {
            mode: FakeLyricsMode::Outcome(LyricsOutcome::Provided {
                lines: Self::lines(),
                chords: ChordSource::Provided(chords),
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            mode: FakeLyricsMode::Outcome(LyricsOutcome::unavailable("service down")),
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: FakeLyricsMode::Error,
        }
    }
}

#[async_trait]
impl LyricsService for FakeLyrics {
    async fn transcribe(
        &self,
        _vocals: &Path,
        _track: &TrackInfo,
    ) -> Result<LyricsOutcome, CollaboratorError> {
        match &self.mode {
            FakeLyricsMode::Outcome(outcome) => Ok(outcome.clone()),
            FakeLyricsMode::Error => Err(CollaboratorError::Http("connection refused".to_string())),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Handles to the fakes, for inspecting calls after a run
pub struct Fakes {
    pub separator: Arc<FakeSeparator>,
    pub transcriber: Arc<FakeTranscriber>,
}

pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub config: ServiceConfig,
    pub service: Arc<AnalysisService>,
    pub events: EventBus,
    pub fakes: Fakes,
}

impl TestHarness {
    /// Path of a fresh WAV inside the harness directory
    pub fn wav(&self, name: &str) -> PathBuf {
        let uploads = self.config.uploads_dir.clone();
        std::fs::create_dir_all(&uploads).unwrap();
        write_test_wav(&uploads.join(name), 0.5)
    }
}

pub struct HarnessBuilder {
    pub features: FakeFeatures,
    pub separator: FakeSeparator,
    pub transcriber: FakeTranscriber,
    pub lyrics: FakeLyrics,
    pub workers: usize,
    pub cancel_purges_queue: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            features: FakeFeatures {
                features: c_then_g_features(),
                fail: false,
            },
            separator: FakeSeparator::new(),
            transcriber: FakeTranscriber::new(),
            lyrics: FakeLyrics::lines_only(),
            workers: 0,
            cancel_purges_queue: false,
        }
    }

    pub fn build(self) -> TestHarness {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            workers: self.workers,
            uploads_dir: dir.path().join("uploads"),
            results_dir: dir.path().join("results"),
            cancel_purges_queue: self.cancel_purges_queue,
            ..ServiceConfig::default()
        };

        let separator = Arc::new(self.separator);
        let transcriber = Arc::new(self.transcriber);
        let collaborators = Collaborators {
            features: Arc::new(self.features),
            separator: separator.clone(),
            transcriber: transcriber.clone(),
            lyrics: Arc::new(self.lyrics),
        };

        let events = EventBus::new(256);
        let service = Arc::new(AnalysisService::new(&config, collaborators, events.clone()));

        TestHarness {
            dir,
            config,
            service,
            events,
            fakes: Fakes {
                separator,
                transcriber,
            },
        }
    }
}
