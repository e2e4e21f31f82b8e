//! Thin adapter around `qdrant-client` for webcam lookups.
//!
//! Stored points carry the same document shape as the Atlas corpus: a
//! `webcam` payload object next to the vector.

use std::{future::Future, pin::Pin};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    PayloadIncludeSelector, SearchParamsBuilder, SearchPointsBuilder,
    with_payload_selector::SelectorOptions,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{IndexConfig, QdrantConfig};
use crate::count::ResultCount;
use crate::errors::IndexError;
use crate::record::{ENTITY_KEY, PROJECTED_FIELDS, RawMatch};
use crate::{SimilarityIndex, finalize};

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    cfg: IndexConfig,
}

impl QdrantIndex {
    /// Builds the client. No network I/O happens until the first search.
    pub fn new(cfg: &IndexConfig, q: &QdrantConfig) -> Result<Self, IndexError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&q.url).timeout(cfg.timeout);
        if let Some(key) = &q.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| IndexError::Config(format!("qdrant client: {e}")))?;

        info!(url = %q.url, collection = %q.collection, "qdrant_index.new: ready");

        Ok(Self {
            client,
            collection: q.collection.clone(),
            cfg: cfg.clone(),
        })
    }

    async fn search_inner(
        &self,
        vector: &[f32],
        k: ResultCount,
    ) -> Result<Vec<RawMatch>, IndexError> {
        let pool = self.cfg.candidate_pool(k.get())?;
        let timeout = self.cfg.timeout;
        debug!(collection = %self.collection, k = k.get(), pool, "qdrant_index.search: start");

        let include = SelectorOptions::Include(PayloadIncludeSelector {
            fields: PROJECTED_FIELDS.iter().map(|f| f.to_string()).collect(),
        });
        let request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), k.get() as u64)
            .with_payload(include)
            .params(SearchParamsBuilder::default().hnsw_ef(pool as u64))
            .timeout(timeout.as_secs().max(1));

        let res = tokio::time::timeout(timeout, self.client.search_points(request))
            .await
            .map_err(|_| IndexError::Unavailable(format!("qdrant search timed out after {timeout:?}")))?
            .map_err(|e| {
                warn!(error = %e, "qdrant_index.search: request failed");
                IndexError::Unavailable(format!("qdrant search failed: {e}"))
            })?;

        let matches = res
            .result
            .into_iter()
            .map(|p| {
                let entity = p
                    .payload
                    .get(ENTITY_KEY)
                    .map(|v| v.clone().into_json())
                    .unwrap_or(Value::Null);
                RawMatch::new(p.score as f64, entity)
            })
            .collect();

        Ok(finalize(matches, k))
    }
}

impl SimilarityIndex for QdrantIndex {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: ResultCount,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawMatch>, IndexError>> + Send + 'a>> {
        Box::pin(self.search_inner(vector, k))
    }
}
