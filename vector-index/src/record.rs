//! Backend-neutral match record.

use serde_json::Value;

/// Field paths projected from each stored document, relative to its root.
pub const PROJECTED_FIELDS: [&str; 6] = [
    "webcam.webcamid",
    "webcam.title",
    "webcam.location.country",
    "webcam.location.latitude",
    "webcam.location.longitude",
    "webcam.player.day",
];

/// Top-level key holding the webcam sub-record in stored documents.
pub const ENTITY_KEY: &str = "webcam";

/// One nearest-neighbour hit as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    /// Similarity score; higher is more similar.
    pub score: f64,
    /// Projected `webcam` sub-record, or `Null` when the backend returned none.
    pub entity: Value,
}

impl RawMatch {
    pub fn new(score: f64, entity: Value) -> Self {
        Self { score, entity }
    }
}
