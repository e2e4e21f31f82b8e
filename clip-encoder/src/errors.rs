//! Unified error type for the clip-encoder crate.

use thiserror::Error;

/// Errors produced while turning a query into an embedding vector.
#[derive(Debug, Error)]
pub enum EncodeError {
    // ── Request-side failures ───────────────────────────────────────────────
    /// Query payload is unusable: empty text, undecodable image, bad URL.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Remote image could not be fetched (transport error or non-2xx status).
    #[error("image retrieval failed: {0}")]
    Retrieval(String),

    // ── Model-side failures ─────────────────────────────────────────────────
    /// Model files are missing or could not be loaded at startup.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Model execution failed or produced an unusable output.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The projection head returned a vector of unexpected length.
    #[error("embedding dim {got} != expected {want}")]
    DimensionMismatch { got: usize, want: usize },

    // ── Configuration / environment ─────────────────────────────────────────
    /// Invalid or missing configuration value.
    #[error("config error: {0}")]
    Config(String),
}

impl EncodeError {
    /// True for failures caused by the caller's input rather than the service.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, EncodeError::InvalidInput(_))
    }
}
