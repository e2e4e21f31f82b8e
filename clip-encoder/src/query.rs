//! Query modalities accepted by the encoder.

use bytes::Bytes;

/// Fixed-length embedding in the shared CLIP text/image space.
pub type EmbeddingVector = Vec<f32>;

/// One search input, tagged by modality.
#[derive(Debug, Clone)]
pub enum Query {
    /// Free text, embedded by the text tower.
    Text(String),
    /// Raw bytes of an uploaded raster image.
    ImageBlob(Bytes),
    /// An image reachable over HTTP(S).
    ImageUrl(String),
}

impl Query {
    /// Short modality label used in logs.
    pub fn modality(&self) -> &'static str {
        match self {
            Query::Text(_) => "text",
            Query::ImageBlob(_) => "image_blob",
            Query::ImageUrl(_) => "image_url",
        }
    }
}
