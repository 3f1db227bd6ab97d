//! songlab-an library interface
//!
//! Audio analysis jobs: chord chart, key, stems, notes and lyrics for one
//! uploaded file, run as a staged pipeline behind an HTTP API.

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use songlab_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::pipeline::AnalysisService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<AnalysisService>, config: ServiceConfig) -> Self {
        Self {
            event_bus: service.events().clone(),
            service,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let body_limit = state.config.max_upload_mb.saturating_mul(1024 * 1024);
    let files = api::file_routes(&state.config.results_dir, &state.config.uploads_dir);

    // Browsers read stem samples cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .merge(api::job_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .merge(files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
