//! Pipeline runner
//!
//! Drives one job through METADATA → STEM_SEPARATION → NOTE_DETECTION →
//! LYRICS_AND_CHORDS → FINALIZE. Each stage publishes a snapshot when it
//! starts and another when its output lands in `partial`. The cancel token
//! is checked before and after every external call; a running external call
//! is never interrupted.

use chrono::Utc;
use songlab_common::events::{EventBus, SongLabEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dispatch::WorkItem;
use super::store::{JobStateStore, StoreError};
use super::{PipelineError, StageError};
use crate::analysis::{
    aggregate_chroma, align_lyrics, detect_key, normalize_segments, write_lyric_sheet, ChordError,
    ChordRecognizer, FrameClock,
};
use crate::models::{
    AnalysisParameters, AnalysisResult, ChordSegment, JobStage, JobState, LyricsData, NotesByStem,
    PartialResults, SourceFile, StemMap, TrackMetadata, UNKNOWN_KEY,
};
use crate::services::{
    probe_input, read_tags, AudioFeatures, ChordSource, Collaborators, LyricsOutcome, TrackInfo,
    TrackTags,
};

/// Subdirectory of the song output directory holding note CSVs
const NOTES_WORK_DIR: &str = "notes";

/// Values carried from one stage to the next
struct StageContext {
    job_id: Uuid,
    source: SourceFile,
    song_id: String,
    output_dir: PathBuf,
    features: Option<AudioFeatures>,
    tags: TrackTags,
    metadata: Option<TrackMetadata>,
    stems: StemMap,
    notes: NotesByStem,
    chords: Vec<ChordSegment>,
    lyrics: LyricsData,
    lyrics_doc: Option<PathBuf>,
}

impl StageContext {
    fn new(job_id: Uuid, source: SourceFile, results_dir: &Path) -> Self {
        let song_id = source.song_id();
        // Per job, so concurrent runs of the same song never share files
        let output_dir = results_dir
            .join(&song_id)
            .join(job_id.simple().to_string());
        Self {
            job_id,
            source,
            song_id,
            output_dir,
            features: None,
            tags: TrackTags::default(),
            metadata: None,
            stems: StemMap::new(),
            notes: NotesByStem::new(),
            chords: Vec::new(),
            lyrics: LyricsData::default(),
            lyrics_doc: None,
        }
    }

    fn track_info(&self) -> TrackInfo {
        TrackInfo {
            song_id: self.song_id.clone(),
            artist: self.tags.artist.clone(),
            title: self.tags.title.clone(),
        }
    }
}

/// Result of publishing a snapshot
enum Publish {
    Published,
    /// Job was cancelled, evicted or otherwise finished elsewhere
    Stopped,
}

/// Executes the analysis stages for one job at a time
pub struct PipelineRunner {
    store: Arc<JobStateStore>,
    events: EventBus,
    collaborators: Collaborators,
    recognizer: ChordRecognizer,
    parameters: AnalysisParameters,
    results_dir: PathBuf,
}

impl PipelineRunner {
    pub fn new(
        store: Arc<JobStateStore>,
        events: EventBus,
        collaborators: Collaborators,
        parameters: AnalysisParameters,
        results_dir: PathBuf,
    ) -> Self {
        let recognizer =
            ChordRecognizer::new(parameters.chord_threshold, parameters.min_chord_duration);
        Self {
            store,
            events,
            collaborators,
            recognizer,
            parameters,
            results_dir,
        }
    }

    /// Run `item` to a terminal state and return that state
    ///
    /// Returns the last known state when the job was evicted mid-run.
    pub async fn run(&self, item: WorkItem) -> JobState {
        let WorkItem {
            job_id,
            source,
            cancel_token,
        } = item;

        if cancel_token.is_cancelled() {
            return self.finish_cancelled(job_id, false).await;
        }

        if let Err(e) = probe_input(&source.path).await {
            return self.finish_failed(job_id, None, PipelineError::Input(e)).await;
        }

        match self
            .store
            .update(job_id, |job| {
                job.transition_to(JobState::Running);
                job.snapshot.status_message = "Starting analysis...".to_string();
            })
            .await
        {
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(job_id = %job_id, error = %e, "Job no longer runnable");
                return self.current_state(job_id).await;
            }
        }

        tracing::info!(
            job_id = %job_id,
            file = %source.path.display(),
            "Analysis started"
        );

        let mut ctx = StageContext::new(job_id, source, &self.results_dir);

        for stage in JobStage::ALL {
            if cancel_token.is_cancelled() {
                return self.finish_cancelled(job_id, true).await;
            }

            if let Publish::Stopped = self.publish_started(job_id, stage).await {
                return self.current_state(job_id).await;
            }

            tracing::info!(job_id = %job_id, stage = %stage, "Stage started");

            let partial = match self.run_stage(stage, &mut ctx, &cancel_token).await {
                Ok(partial) => partial,
                Err(StageError::Cancelled) => return self.finish_cancelled(job_id, true).await,
                Err(StageError::Failed(message)) => {
                    let error = PipelineError::Stage { stage, message };
                    return self.finish_failed(job_id, Some(stage), error).await;
                }
            };

            if cancel_token.is_cancelled() {
                return self.finish_cancelled(job_id, true).await;
            }

            if stage == JobStage::Finalize {
                return self.finish_succeeded(&mut ctx).await;
            }

            if let Publish::Stopped = self.publish_completed(job_id, stage, partial).await {
                return self.current_state(job_id).await;
            }
        }

        self.current_state(job_id).await
    }

    async fn run_stage(
        &self,
        stage: JobStage,
        ctx: &mut StageContext,
        cancel_token: &CancellationToken,
    ) -> Result<PartialResults, StageError> {
        match stage {
            JobStage::Metadata => self.stage_metadata(ctx).await,
            JobStage::StemSeparation => self.stage_stems(ctx).await,
            JobStage::NoteDetection => self.stage_notes(ctx, cancel_token).await,
            JobStage::LyricsAndChords => self.stage_lyrics_and_chords(ctx, cancel_token).await,
            JobStage::Finalize => Ok(PartialResults::default()),
        }
    }

    // ========================================================================
    // Stages
    // ========================================================================

    async fn stage_metadata(&self, ctx: &mut StageContext) -> Result<PartialResults, StageError> {
        let features = self
            .collaborators
            .features
            .extract(&ctx.source.path)
            .await
            .map_err(|e| StageError::Failed(e.to_string()))?;

        let path = ctx.source.path.clone();
        ctx.tags = tokio::task::spawn_blocking(move || read_tags(&path))
            .await
            .unwrap_or_default();

        let estimated_key = detect_key(&aggregate_chroma(&features.chroma_frames))
            .map(|key| key.to_string())
            .unwrap_or_else(|| UNKNOWN_KEY.to_string());

        let metadata = TrackMetadata {
            bpm: round_to(features.bpm, 2),
            duration_seconds: features.duration_seconds,
            estimated_key,
            loudness_rms: round_to(features.loudness_rms, 4),
            brightness: round_to(features.brightness, 2),
            artist: ctx.tags.artist.clone(),
            title: ctx.tags.title.clone(),
        };

        tracing::debug!(
            job_id = %ctx.job_id,
            bpm = metadata.bpm,
            key = %metadata.estimated_key,
            "Metadata extracted"
        );

        ctx.features = Some(features);
        ctx.metadata = Some(metadata.clone());

        Ok(PartialResults {
            metadata: Some(metadata),
            ..Default::default()
        })
    }

    async fn stage_stems(&self, ctx: &mut StageContext) -> Result<PartialResults, StageError> {
        let stems = self
            .collaborators
            .separator
            .separate(&ctx.source.path, &ctx.output_dir)
            .await
            .map_err(|e| StageError::Failed(e.to_string()))?;

        ctx.stems = stems.clone();

        Ok(PartialResults {
            stems: Some(stems),
            ..Default::default()
        })
    }

    async fn stage_notes(
        &self,
        ctx: &mut StageContext,
        cancel_token: &CancellationToken,
    ) -> Result<PartialResults, StageError> {
        let work_dir = ctx.output_dir.join(NOTES_WORK_DIR);
        let mut notes = NotesByStem::new();

        for stem in &self.parameters.melodic_stems {
            if cancel_token.is_cancelled() {
                return Err(StageError::Cancelled);
            }

            let path = match ctx.stems.get(stem) {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::warn!(job_id = %ctx.job_id, stem = %stem, "Stem missing, skipping note detection");
                    notes.insert(stem.clone(), Vec::new());
                    continue;
                }
            };

            let events = match self.collaborators.transcriber.transcribe(path, &work_dir).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(job_id = %ctx.job_id, stem = %stem, error = %e, "Note detection failed for stem");
                    Vec::new()
                }
            };
            notes.insert(stem.clone(), events);
        }

        ctx.notes = notes.clone();

        Ok(PartialResults {
            notes: Some(notes),
            ..Default::default()
        })
    }

    async fn stage_lyrics_and_chords(
        &self,
        ctx: &mut StageContext,
        cancel_token: &CancellationToken,
    ) -> Result<PartialResults, StageError> {
        let outcome = match ctx.stems.get("vocals") {
            Some(vocals) if vocals.exists() => {
                match self.collaborators.lyrics.transcribe(vocals, &ctx.track_info()).await {
                    Ok(outcome) => outcome,
                    Err(e) => LyricsOutcome::unavailable(e.to_string()),
                }
            }
            _ => LyricsOutcome::unavailable("no vocals stem"),
        };

        if cancel_token.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let (lines, provided_chords) = match outcome {
            LyricsOutcome::Provided { lines, chords } => (lines, chords),
            LyricsOutcome::Unavailable { reason } => {
                tracing::warn!(job_id = %ctx.job_id, reason = %reason, "Lyrics unavailable");
                (Vec::new(), ChordSource::Unavailable)
            }
        };

        let chords = match provided_chords {
            ChordSource::Provided(chords) => {
                let received = chords.len();
                let chords = normalize_segments(chords);
                if chords.len() != received {
                    tracing::debug!(
                        job_id = %ctx.job_id,
                        received,
                        kept = chords.len(),
                        "Normalized service chords"
                    );
                }
                if chords.is_empty() {
                    tracing::warn!(job_id = %ctx.job_id, "Service chords unusable, recognizing locally");
                    self.recognize_chords(ctx)
                } else {
                    chords
                }
            }
            ChordSource::Unavailable => self.recognize_chords(ctx),
        };

        let lyrics = if lines.is_empty() {
            LyricsData::Plain(Vec::new())
        } else if chords.is_empty() {
            LyricsData::Plain(lines)
        } else {
            LyricsData::Aligned(align_lyrics(&lines, &chords))
        };

        if !lyrics.is_empty() {
            let title = ctx.tags.title.clone().unwrap_or_else(|| ctx.song_id.clone());
            match write_lyric_sheet(&ctx.output_dir, &title, &lyrics).await {
                Ok(path) => ctx.lyrics_doc = Some(path),
                Err(e) => {
                    tracing::warn!(job_id = %ctx.job_id, error = %e, "Failed to write lyric sheet")
                }
            }
        }

        ctx.chords = chords.clone();
        ctx.lyrics = lyrics.clone();

        Ok(PartialResults {
            chords: Some(chords),
            lyrics: Some(lyrics),
            ..Default::default()
        })
    }

    /// Local chord recognition over the mix chroma
    fn recognize_chords(&self, ctx: &StageContext) -> Vec<ChordSegment> {
        let Some(features) = ctx.features.as_ref() else {
            return Vec::new();
        };
        let clock = FrameClock::new(features.hop_length, features.sample_rate);

        match self.recognizer.recognize(&features.chroma_frames, clock) {
            Ok(chords) => chords,
            Err(ChordError::InsufficientAudio) => {
                tracing::warn!(job_id = %ctx.job_id, "No chroma frames, chord chart left empty");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    async fn publish_started(&self, job_id: Uuid, stage: JobStage) -> Publish {
        let progress = stage.started_progress();
        let status = stage.started_message().to_string();

        let result = self
            .store
            .update(job_id, |job| {
                job.snapshot.stage = Some(stage);
                job.snapshot.progress = progress;
                job.snapshot.status_message = status.clone();
            })
            .await;

        self.publish_outcome(job_id, result, || SongLabEvent::JobStageStarted {
            job_id,
            stage: stage.as_str().to_string(),
            progress,
            status: stage.started_message().to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn publish_completed(
        &self,
        job_id: Uuid,
        stage: JobStage,
        partial: PartialResults,
    ) -> Publish {
        let progress = stage.completed_progress();

        let result = self
            .store
            .update(job_id, |job| {
                job.snapshot.progress = progress;
                job.snapshot.status_message = stage.completed_message().to_string();
                job.snapshot.partial = partial;
            })
            .await;

        self.publish_outcome(job_id, result, || SongLabEvent::JobProgress {
            job_id,
            stage: stage.as_str().to_string(),
            progress,
            status: stage.completed_message().to_string(),
            timestamp: Utc::now(),
        })
    }

    fn publish_outcome<F>(
        &self,
        job_id: Uuid,
        result: Result<crate::models::AnalysisJob, StoreError>,
        event: F,
    ) -> Publish
    where
        F: FnOnce() -> SongLabEvent,
    {
        match result {
            Ok(_) => {
                self.events.emit_lossy(event());
                Publish::Published
            }
            Err(e) => {
                tracing::debug!(job_id = %job_id, error = %e, "Stopping pipeline");
                Publish::Stopped
            }
        }
    }

    // ========================================================================
    // Terminal transitions
    // ========================================================================

    async fn finish_succeeded(&self, ctx: &mut StageContext) -> JobState {
        let job_id = ctx.job_id;
        let Some(metadata) = ctx.metadata.take() else {
            let error = PipelineError::Stage {
                stage: JobStage::Finalize,
                message: "metadata missing".to_string(),
            };
            return self.finish_failed(job_id, Some(JobStage::Finalize), error).await;
        };

        let result = AnalysisResult {
            song_id: ctx.song_id.clone(),
            metadata,
            chords: std::mem::take(&mut ctx.chords),
            notes: std::mem::take(&mut ctx.notes),
            stems: std::mem::take(&mut ctx.stems),
            lyrics_data: std::mem::take(&mut ctx.lyrics),
            lyrics_doc: ctx.lyrics_doc.take(),
        };

        let stage = JobStage::Finalize;
        match self
            .store
            .update(job_id, |job| {
                job.transition_to(JobState::Succeeded);
                job.snapshot.stage = Some(stage);
                job.snapshot.progress = stage.completed_progress();
                job.snapshot.status_message = stage.completed_message().to_string();
                job.result = Some(result);
            })
            .await
        {
            Ok(job) => {
                let duration_seconds = job.elapsed_seconds();
                tracing::info!(job_id = %job_id, duration_seconds, "Analysis complete");
                self.events.emit_lossy(SongLabEvent::JobSucceeded {
                    job_id,
                    duration_seconds,
                    timestamp: Utc::now(),
                });
                JobState::Succeeded
            }
            Err(e) => {
                tracing::debug!(job_id = %job_id, error = %e, "Result discarded");
                self.current_state(job_id).await
            }
        }
    }

    async fn finish_failed(
        &self,
        job_id: Uuid,
        stage: Option<JobStage>,
        error: PipelineError,
    ) -> JobState {
        let message = error.to_string();
        tracing::error!(job_id = %job_id, stage = ?stage, error = %message, "Analysis failed");

        let result = self
            .store
            .update(job_id, |job| {
                job.transition_to(JobState::Failed);
                job.snapshot.status_message = message.clone();
                job.error = Some(message.clone());
            })
            .await;

        match result {
            Ok(_) => {
                self.events.emit_lossy(SongLabEvent::JobFailed {
                    job_id,
                    stage: stage.map(|s| s.as_str().to_string()),
                    error: message,
                    timestamp: Utc::now(),
                });
                JobState::Failed
            }
            Err(_) => self.current_state(job_id).await,
        }
    }

    async fn finish_cancelled(&self, job_id: Uuid, was_running: bool) -> JobState {
        let result = self
            .store
            .update(job_id, |job| {
                job.transition_to(JobState::Cancelled);
                job.snapshot.status_message = "Cancelled".to_string();
            })
            .await;

        match result {
            Ok(_) => {
                tracing::info!(job_id = %job_id, "Analysis cancelled");
                self.events.emit_lossy(SongLabEvent::JobCancelled {
                    job_id,
                    was_running,
                    timestamp: Utc::now(),
                });
            }
            // Already evicted or finalized by the cancellation coordinator
            Err(e) => tracing::debug!(job_id = %job_id, error = %e, "Cancel observed"),
        }
        JobState::Cancelled
    }

    async fn current_state(&self, job_id: Uuid) -> JobState {
        self.store
            .get(job_id)
            .await
            .map(|job| job.state())
            .unwrap_or(JobState::Cancelled)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
