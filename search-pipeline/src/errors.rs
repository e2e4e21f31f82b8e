//! Pipeline error taxonomy.

use clip_encoder::EncodeError;
use thiserror::Error;
use vector_index::IndexError;

/// A stored match could not be turned into an `OutputRecord`.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("malformed match: {0}")]
    MalformedMatch(String),
}

/// Whole-request failure surfaced by every pipeline entry point.
///
/// `Display` carries the underlying cause for logs; clients get
/// [`SearchError::public_message`] instead.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Bad query text, bad count, or undecodable image.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote image for a URL query could not be fetched.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// The similarity index is unreachable or erroring.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A returned match is missing required fields.
    #[error("malformed match: {0}")]
    MalformedMatch(String),

    /// Model or configuration failure inside the service.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidInput(_) => "INVALID_INPUT",
            SearchError::Retrieval(_) => "RETRIEVAL_ERROR",
            SearchError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            SearchError::MalformedMatch(_) => "MALFORMED_MATCH",
            SearchError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message. Only input errors echo their cause; the rest
    /// never leak backend or model text.
    pub fn public_message(&self) -> String {
        match self {
            SearchError::InvalidInput(cause) => cause.clone(),
            SearchError::Retrieval(_) => "could not retrieve the image at the given URL".into(),
            SearchError::BackendUnavailable(_) => "similarity index is unavailable".into(),
            SearchError::MalformedMatch(_) => "a stored match is missing required fields".into(),
            SearchError::Internal(_) => "internal error".into(),
        }
    }
}

impl From<EncodeError> for SearchError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::InvalidInput(m) => SearchError::InvalidInput(m),
            EncodeError::Retrieval(m) => SearchError::Retrieval(m),
            other => SearchError::Internal(other.to_string()),
        }
    }
}

impl From<IndexError> for SearchError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::InvalidCount(_) | IndexError::CountTooLarge { .. } => {
                SearchError::InvalidInput(e.to_string())
            }
            IndexError::Unavailable(m) => SearchError::BackendUnavailable(m),
            IndexError::MalformedMatch(m) => SearchError::MalformedMatch(m),
            other => SearchError::Internal(other.to_string()),
        }
    }
}

impl From<MapError> for SearchError {
    fn from(e: MapError) -> Self {
        match e {
            MapError::MalformedMatch(m) => SearchError::MalformedMatch(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_text_is_not_public() {
        let e: SearchError =
            IndexError::Unavailable("connection refused to 10.0.0.7:27017".into()).into();
        assert_eq!(e.code(), "BACKEND_UNAVAILABLE");
        assert!(!e.public_message().contains("10.0.0.7"));
        assert!(e.to_string().contains("10.0.0.7"));
    }

    #[test]
    fn count_errors_are_input_errors() {
        let e: SearchError = IndexError::InvalidCount("abc".into()).into();
        assert_eq!(e.code(), "INVALID_INPUT");
        assert!(e.public_message().contains("abc"));
    }

    #[test]
    fn oversized_counts_are_input_errors() {
        let e: SearchError = IndexError::CountTooLarge {
            k: 20_000,
            max: 10_000,
        }
        .into();
        assert_eq!(e.code(), "INVALID_INPUT");
        assert!(e.public_message().contains("20000"));
    }

    #[test]
    fn malformed_index_matches_keep_their_class() {
        let e: SearchError = IndexError::MalformedMatch("no score".into()).into();
        assert_eq!(e.code(), "MALFORMED_MATCH");
        assert!(!e.public_message().contains("no score"));
    }

    #[test]
    fn model_failures_are_internal() {
        let e: SearchError = EncodeError::DimensionMismatch { got: 3, want: 512 }.into();
        assert_eq!(e.code(), "INTERNAL_ERROR");
        assert_eq!(e.public_message(), "internal error");
    }
}
