//! HTTP front end.
//!
//! - `GET /` plain greeting page
//! - `GET /health` registered models and cache size
//! - `POST /nearest_prompts` nearest dataset records for a query
//! - `POST /keywords` keyword extraction over the raw body

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::picker::EmbedPicker;

pub use error::{ServerError, ServerResult};
pub use routes::RetrievalRequest;

/// Shared across all requests.
pub struct AppState {
    pub picker: EmbedPicker,
    /// Request filenames are resolved under this directory.
    pub data_root: PathBuf,
}

impl AppState {
    pub fn new(picker: EmbedPicker, data_root: impl Into<PathBuf>) -> Self {
        Self {
            picker,
            data_root: data_root.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.build_picker(), config.data_root.clone())
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/nearest_prompts", post(routes::nearest_prompts))
        .route("/keywords", post(routes::keywords))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let addr = config.socket_addr().await?;
    let state = Arc::new(AppState::from_config(&config));

    tracing::info!(
        %addr,
        data_root = %config.data_root.display(),
        models = ?state.picker.registry().names(),
        "starting embed_picker"
    );

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
