//! Client-facing result shape.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;

/// Thumbnail width advertised for every record.
pub const THUMBNAIL_WIDTH: u32 = 200;
/// Thumbnail height advertised for every record.
pub const THUMBNAIL_HEIGHT: u32 = 112;

/// Webcam identifier. Keeps the JSON type it had in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebcamId {
    Number(Number),
    Text(String),
}

impl fmt::Display for WebcamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebcamId::Number(n) => n.fmt(f),
            WebcamId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Urls {
    pub small: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One search result, serialized as
/// `{id, score, created_at, width, height, description, urls, links, location}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: WebcamId,
    pub score: f64,
    /// Always empty: the corpus carries no capture time.
    pub created_at: String,
    pub width: u32,
    pub height: u32,
    pub description: String,
    pub urls: Urls,
    pub links: Links,
    pub location: Location,
}
