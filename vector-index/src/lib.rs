//! Similarity index client.
//!
//! Given a query vector and a validated count `k`, returns up to `k` stored
//! webcam entities with their similarity scores, most similar first.
//!
//! Two backends share one contract:
//! - [`atlas::AtlasIndex`]: MongoDB Atlas `$vectorSearch` (default).
//! - [`qdrant_facade::QdrantIndex`]: Qdrant `search_points`.
//!
//! Searches are read-only, never retried, and bounded by a timeout. Any
//! backend failure surfaces as [`IndexError::Unavailable`].

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::info;

pub mod atlas;
pub mod config;
pub mod count;
pub mod errors;
pub mod qdrant_facade;
pub mod record;

pub use config::{AtlasConfig, BackendConfig, IndexConfig, MAX_NUM_CANDIDATES, QdrantConfig};
pub use count::ResultCount;
pub use errors::IndexError;
pub use record::RawMatch;

/// k-nearest-neighbour lookup over the stored corpus.
pub trait SimilarityIndex: Send + Sync {
    /// Short backend label used in logs.
    fn backend(&self) -> &'static str;

    /// At most `k` matches in non-increasing score order.
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: ResultCount,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawMatch>, IndexError>> + Send + 'a>>;
}

/// Opens the backend selected by `cfg`. Clients are pooled and reused.
pub async fn connect(cfg: &IndexConfig) -> Result<Arc<dyn SimilarityIndex>, IndexError> {
    info!(backend = cfg.backend.name(), "vector_index.connect: start");
    let index: Arc<dyn SimilarityIndex> = match &cfg.backend {
        BackendConfig::Atlas(a) => Arc::new(atlas::AtlasIndex::connect(cfg, a).await?),
        BackendConfig::Qdrant(q) => Arc::new(qdrant_facade::QdrantIndex::new(cfg, q)?),
    };
    Ok(index)
}

/// Sorts by descending score and keeps the first `k`.
///
/// The sort is stable: equal scores keep the backend's order.
pub fn finalize(mut matches: Vec<RawMatch>, k: ResultCount) -> Vec<RawMatch> {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(k.get());
    matches
}
