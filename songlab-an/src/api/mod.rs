//! HTTP API handlers for songlab-an

pub mod files;
pub mod health;
pub mod jobs;
pub mod sse;

pub use files::file_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use sse::event_stream;
