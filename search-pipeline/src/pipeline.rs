//! Query pipeline: parse count → encode → search → map.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use clip_encoder::{Query, QueryEncoder};
use tracing::{error, info, instrument};
use vector_index::{ResultCount, SimilarityIndex};

use crate::errors::SearchError;
use crate::mapper::ResultMapper;
use crate::output_record::OutputRecord;

/// One search request as received from a client.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: Query,
    /// Raw count string; validated before any encoding work.
    pub count: String,
}

/// Stateless orchestrator shared by all requests.
#[derive(Clone)]
pub struct SearchPipeline {
    encoder: Arc<dyn QueryEncoder>,
    index: Arc<dyn SimilarityIndex>,
    mapper: ResultMapper,
}

impl SearchPipeline {
    pub fn new(
        encoder: Arc<dyn QueryEncoder>,
        index: Arc<dyn SimilarityIndex>,
        mapper: ResultMapper,
    ) -> Self {
        Self {
            encoder,
            index,
            mapper,
        }
    }

    pub async fn search_by_text(
        &self,
        text: impl Into<String>,
        count: impl Into<String>,
    ) -> Result<Vec<OutputRecord>, SearchError> {
        self.search(SearchRequest {
            query: Query::Text(text.into()),
            count: count.into(),
        })
        .await
    }

    pub async fn search_by_image(
        &self,
        image: Bytes,
        count: impl Into<String>,
    ) -> Result<Vec<OutputRecord>, SearchError> {
        self.search(SearchRequest {
            query: Query::ImageBlob(image),
            count: count.into(),
        })
        .await
    }

    pub async fn search_by_url(
        &self,
        url: impl Into<String>,
        count: impl Into<String>,
    ) -> Result<Vec<OutputRecord>, SearchError> {
        self.search(SearchRequest {
            query: Query::ImageUrl(url.into()),
            count: count.into(),
        })
        .await
    }

    /// Runs one request end to end. Any failure fails the whole request;
    /// the cause is logged here before the error is returned.
    #[instrument(skip_all, fields(modality = req.query.modality(), backend = self.index.backend()))]
    pub async fn search(&self, req: SearchRequest) -> Result<Vec<OutputRecord>, SearchError> {
        let started = Instant::now();
        match self.run(&req).await {
            Ok(records) => {
                info!(
                    count = %req.count.trim(),
                    results = records.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "search: done"
                );
                Ok(records)
            }
            Err(e) => {
                error!(code = e.code(), cause = %e, "search: failed");
                Err(e)
            }
        }
    }

    async fn run(&self, req: &SearchRequest) -> Result<Vec<OutputRecord>, SearchError> {
        let k: ResultCount = req.count.parse()?;
        let vector = self.encoder.encode(&req.query).await?;
        let matches = self.index.search(&vector, k).await?;
        let records = self.mapper.map_all(&matches)?;
        Ok(records)
    }
}
