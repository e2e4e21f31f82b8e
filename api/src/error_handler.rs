use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clip_encoder::EncodeError;
use search_pipeline::SearchError;
use serde::Serialize;
use thiserror::Error;
use vector_index::IndexError;

use crate::core::app_config::ConfigError;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("encoder startup failed: {0}")]
    Encoder(#[from] EncodeError),

    #[error("index startup failed: {0}")]
    Index(#[from] IndexError),

    #[error("startup failed: {0}")]
    Startup(String),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Pipeline failure; the cause was logged where it happened.
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 4xx
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,

            // pipeline: every failure is server-side from the client's view
            AppError::Search(SearchError::Retrieval(_)) => StatusCode::BAD_GATEWAY,
            AppError::Search(SearchError::BackendUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 5xx, startup-only
            AppError::Config(_)
            | AppError::Encoder(_)
            | AppError::Index(_)
            | AppError::Startup(_)
            | AppError::Bind(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Encoder(_) | AppError::Index(_) | AppError::Startup(_) => "STARTUP_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Search(e) => e.code(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Search(e) => e.public_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}
