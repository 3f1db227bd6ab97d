//! songlab-an - Audio analysis service
//!
//! Accepts audio uploads and runs each through metadata, stem separation,
//! note detection and lyrics/chord stages. Progress is polled over HTTP or
//! streamed over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use songlab_common::config::{ensure_directory_exists, resolve_root_folder, ROOT_FOLDER_ENV};
use songlab_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songlab_an::config::ServiceConfig;
use songlab_an::pipeline::AnalysisService;
use songlab_an::services::Collaborators;
use songlab_an::AppState;

/// Command-line arguments for songlab-an
#[derive(Parser, Debug)]
#[command(name = "songlab-an")]
#[command(about = "Audio analysis service for SongLab")]
#[command(version)]
struct Args {
    /// Root folder holding songlab.toml, uploads and results
    #[arg(short, long, env = "SONGLAB_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "SONGLAB_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SONGLAB_PORT")]
    port: Option<u16>,

    /// Concurrent analysis jobs
    #[arg(short, long, env = "SONGLAB_WORKERS")]
    workers: Option<usize>,

    /// Cancelling a job also drops every other queued job
    #[arg(long)]
    cancel_purges_queue: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "songlab_an=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        build_timestamp = env!("BUILD_TIMESTAMP"),
        build_profile = env!("BUILD_PROFILE"),
        "Starting songlab-an (Audio Analysis) service"
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV);
    ensure_directory_exists(&root_folder).context("Failed to initialize root folder")?;
    info!("Root folder: {}", root_folder.display());

    let mut config = ServiceConfig::load(&root_folder).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.cancel_purges_queue {
        config.cancel_purges_queue = true;
    }

    ensure_directory_exists(&config.uploads_dir).context("Failed to create uploads folder")?;
    ensure_directory_exists(&config.results_dir).context("Failed to create results folder")?;

    if config.workers == 0 {
        warn!("Worker count is 0, queued jobs will not run");
    }
    if config.lyrics_service_url.is_none() {
        warn!("No lyrics service configured, lyrics will be unavailable");
    }

    let collaborators =
        Collaborators::from_config(&config).context("Failed to initialize collaborators")?;
    let event_bus = EventBus::new(config.event_capacity);
    let service = Arc::new(AnalysisService::new(&config, collaborators, event_bus));
    info!(workers = config.workers, "Analysis service initialized");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let app = songlab_an::build_router(AppState::new(Arc::clone(&service), config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
