//! HTTP surface for webcam similarity search.
//!
//! Routes:
//! - `POST /api/searchWebcamFromAtlas`: JSON `{ "query", "count" }`
//! - `POST /api/searchWebcamByImage`: multipart `count` + `image`
//! - `POST /api/searchWebcamByURL`: JSON `{ "imageUrl", "count" }`
//! - `GET  /health`

use std::sync::Arc;

mod core;
mod error_handler;
mod routes;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use crate::core::app_config::{AppConfig, ConfigError};
pub use crate::core::app_state::AppState;
pub use crate::core::request_id::REQUEST_ID_HEADER;
pub use crate::core::telemetry;
pub use crate::error_handler::AppError;

use crate::core::request_id::propagate_request_id;
use crate::routes::{
    health_route::health_route, search_image::search_image_route::search_image_route,
    search_text::search_text_route::search_text_route,
    search_url::search_url_route::search_url_route,
};

/// Builds the router over a ready pipeline.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/searchWebcamFromAtlas", post(search_text_route))
        .route("/api/searchWebcamByImage", post(search_image_route))
        .route("/api/searchWebcamByURL", post(search_url_route))
        .route("/health", get(health_route))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(propagate_request_id))
        .with_state(state)
}

/// Reads configuration, loads the model, connects the index and serves until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let cfg = AppConfig::from_env()?;
    let state = Arc::new(AppState::from_env(&cfg).await?);
    let app = router(state, cfg.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&cfg.address)
        .await
        .map_err(AppError::Bind)?;
    info!(address = %cfg.address, "api.start: listening");

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("api.start: stopped");
    Ok(())
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
