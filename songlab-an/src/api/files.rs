//! Static result and upload files
//!
//! Stems, lyric sheets and uploads are served straight from disk. Adding
//! `?download=true` asks the browser to save the file instead of playing it.

use axum::{
    extract::{Query, Request},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    Router,
};
use serde::Deserialize;
use std::path::Path;
use tower_http::services::ServeDir;
use tracing::debug;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
struct FileQuery {
    download: Option<String>,
}

impl FileQuery {
    fn wants_download(&self) -> bool {
        matches!(self.download.as_deref(), Some("true") | Some("1"))
    }
}

/// Build static file routes under `/files`
pub fn file_routes(results_dir: &Path, uploads_dir: &Path) -> Router<AppState> {
    Router::new()
        .nest_service("/files/results", ServeDir::new(results_dir))
        .nest_service("/files/uploads", ServeDir::new(uploads_dir))
        .layer(middleware::from_fn(download_disposition))
}

/// Mark successful responses as attachments when `download` is set
pub async fn download_disposition(request: Request, next: Next) -> Response {
    let wants_download = Query::<FileQuery>::try_from_uri(request.uri())
        .map(|Query(q)| q.wants_download())
        .unwrap_or(false);
    let file_name = attachment_name(request.uri().path());

    let mut response = next.run(request).await;
    if !wants_download || !response.status().is_success() {
        return response;
    }

    if let Some(name) = file_name {
        match HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
            Ok(value) => {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }
            Err(e) => debug!(name = %name, error = %e, "Skipping Content-Disposition"),
        }
    }
    response
}

/// Last path segment, without characters that would break the header
fn attachment_name(path: &str) -> Option<String> {
    let name: String = path
        .rsplit('/')
        .next()?
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_name_is_last_segment() {
        assert_eq!(
            attachment_name("/files/results/song/abc/lyrics.txt").as_deref(),
            Some("lyrics.txt")
        );
        assert_eq!(attachment_name("/files/results/").as_deref(), None);
        assert_eq!(attachment_name("/files/a\"b.wav").as_deref(), Some("ab.wav"));
    }

    #[test]
    fn test_download_flag_values() {
        let flag = |v: &str| FileQuery {
            download: Some(v.to_string()),
        };
        assert!(flag("true").wants_download());
        assert!(flag("1").wants_download());
        assert!(!flag("false").wants_download());
        assert!(!FileQuery::default().wants_download());
    }
}
