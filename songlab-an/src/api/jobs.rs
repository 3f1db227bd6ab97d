//! Analysis job API handlers
//!
//! POST /upload, POST /analyze, GET /status/:task_id, GET /result/:task_id,
//! POST /cancel/:task_id, DELETE /result/:task_id

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{AnalysisResult, SourceFile},
    pipeline::JobStatus,
    AppState,
};

/// Multipart field carrying the audio file
const FILE_FIELD: &str = "file";

/// POST /upload and POST /analyze response
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub message: String,
}

/// POST /analyze request, for files already on the server
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub file_path: String,
    /// Defaults to the file name of `file_path`
    #[serde(default)]
    pub file_name: Option<String>,
}

/// POST /cancel response
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub task_id: Uuid,
    pub message: String,
    pub was_running: bool,
    /// Queued work items removed
    pub purged: usize,
}

/// Keep only the final path component and drop characters unsafe in file names
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.').to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}

/// POST /upload
///
/// Saves the multipart `file` field under the uploads directory and queues
/// it. Returns 202 with the task id.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.trim().is_empty() {
            return Err(ApiError::BadRequest("No selected file".to_string()));
        }
        let file_name = sanitize_file_name(&original_name);

        tokio::fs::create_dir_all(&state.config.uploads_dir).await?;
        let path = state
            .config
            .uploads_dir
            .join(format!("{}-{}", Uuid::new_v4().simple(), file_name));

        let mut file = tokio::fs::File::create(&path).await?;
        let mut bytes_written = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            bytes_written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::info!(
            file = %file_name,
            path = %path.display(),
            bytes = bytes_written,
            "Upload saved"
        );

        let task_id = state.service.submit(SourceFile::new(path, file_name)).await;
        return Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                task_id,
                message: "Processing started".to_string(),
            }),
        ));
    }

    Err(ApiError::BadRequest("No file part".to_string()))
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let path = std::path::PathBuf::from(&request.file_path);
    if request.file_path.trim().is_empty() {
        return Err(ApiError::BadRequest("file_path is empty".to_string()));
    }

    let file_name = match request.file_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ApiError::BadRequest(format!("No file name in {}", request.file_path)))?,
    };
    let file_name = sanitize_file_name(&file_name);

    let task_id = state.service.submit(SourceFile::new(path, file_name)).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id,
            message: "Processing started".to_string(),
        }),
    ))
}

/// GET /status/:task_id
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<JobStatus>> {
    let status = state.service.get_status(task_id).await?;
    tracing::debug!(task_id = %task_id, state = ?status.state, progress = status.progress, "Status query");
    Ok(Json(status))
}

/// GET /result/:task_id
pub async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<AnalysisResult>> {
    Ok(Json(state.service.get_result(task_id).await?))
}

/// POST /cancel/:task_id
pub async fn cancel(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    let ack = state.service.cancel(task_id).await?;

    let message = if ack.already_finished {
        ack.message
    } else {
        format!(
            "Task {} cancellation request sent. {} pending tasks were purged from the queue.",
            task_id, ack.removed_from_queue
        )
    };

    Ok(Json(CancelResponse {
        task_id,
        message,
        was_running: ack.was_running,
        purged: ack.removed_from_queue,
    }))
}

/// DELETE /result/:task_id
pub async fn forget(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service.forget(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/analyze", post(analyze))
        .route("/status/:task_id", get(get_status))
        .route("/result/:task_id", get(get_result).delete(forget))
        .route("/cancel/:task_id", post(cancel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("song.mp3"), "song.mp3");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\music\\a?b.wav"), "ab.wav");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name("  "), "upload");
    }
}
