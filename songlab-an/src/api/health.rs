//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Module name ("songlab-an")
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Stored jobs per state
    pub jobs: BTreeMap<String, usize>,
    pub queue_depth: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    let jobs = state
        .service
        .job_counts()
        .await
        .into_iter()
        .map(|(job_state, count)| (format!("{job_state:?}").to_lowercase(), count))
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "songlab-an".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        jobs,
        queue_depth: state.service.queue_len().await,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
