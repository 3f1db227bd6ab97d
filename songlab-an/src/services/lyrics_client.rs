//! Lyrics transcription service client
//!
//! POSTs `{vocals_path, song_id, artist, title}` to the configured URL and
//! expects `{lines: [{start, end, text}], chords?: [{start_time, end_time,
//! chord_name}]}` back. An empty `lines` list counts as unavailable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{ChordSource, CollaboratorError, LyricsOutcome, LyricsService, TrackInfo};
use crate::models::{ChordSegment, LyricLine};

const USER_AGENT: &str = concat!("songlab-an/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct LyricsRequest<'a> {
    vocals_path: String,
    song_id: &'a str,
    artist: Option<&'a str>,
    title: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    #[serde(default)]
    lines: Vec<LyricLine>,
    #[serde(default)]
    chords: Option<Vec<ChordSegment>>,
}

impl LyricsResponse {
    fn into_outcome(self) -> LyricsOutcome {
        if self.lines.is_empty() {
            return LyricsOutcome::unavailable("lyrics service returned no lines");
        }
        let chords = match self.chords {
            Some(chords) if !chords.is_empty() => ChordSource::Provided(chords),
            _ => ChordSource::Unavailable,
        };
        LyricsOutcome::Provided {
            lines: self.lines,
            chords,
        }
    }
}

/// HTTP lyrics service
pub struct HttpLyricsService {
    http_client: reqwest::Client,
    url: String,
}

impl HttpLyricsService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LyricsService for HttpLyricsService {
    async fn transcribe(
        &self,
        vocals: &Path,
        track: &TrackInfo,
    ) -> Result<LyricsOutcome, CollaboratorError> {
        let request = LyricsRequest {
            vocals_path: vocals.to_string_lossy().to_string(),
            song_id: &track.song_id,
            artist: track.artist.as_deref(),
            title: track.title.as_deref(),
        };

        debug!(url = %self.url, song_id = %track.song_id, "Requesting lyrics transcription");

        let response = self.http_client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http(format!(
                "{}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: LyricsResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let outcome = body.into_outcome();
        if let LyricsOutcome::Provided { lines, chords } = &outcome {
            info!(
                song_id = %track.song_id,
                lines = lines.len(),
                chords_provided = matches!(chords, ChordSource::Provided(_)),
                "Lyrics transcription received"
            );
        }
        Ok(outcome)
    }
}

/// Used when no lyrics service URL is configured
pub struct DisabledLyricsService;

#[async_trait]
impl LyricsService for DisabledLyricsService {
    async fn transcribe(
        &self,
        _vocals: &Path,
        _track: &TrackInfo,
    ) -> Result<LyricsOutcome, CollaboratorError> {
        Ok(LyricsOutcome::unavailable("lyrics service not configured"))
    }
}
