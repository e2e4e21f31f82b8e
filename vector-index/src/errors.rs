//! Unified error types for the crate.

use thiserror::Error;

/// Errors produced by the similarity index client.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Requested result count is not a positive integer.
    #[error("invalid result count: '{0}'")]
    InvalidCount(String),

    /// Requested result count is larger than any backend will return.
    #[error("result count {k} exceeds the maximum of {max}")]
    CountTooLarge { k: usize, max: usize },

    /// A returned match lacks the fields every match must carry.
    #[error("malformed match: {0}")]
    MalformedMatch(String),

    /// Backend unreachable, erroring, timing out, or answering nonsense.
    #[error("index backend unavailable: {0}")]
    Unavailable(String),

    // ── Configuration / environment ─────────────────────────────────────────
    #[error("missing env variable: {key}")]
    EnvMissing { key: String },

    #[error("failed to parse env variable: {key} = '{value}'")]
    EnvParse { key: String, value: String },

    #[error("config error: {0}")]
    Config(String),
}
