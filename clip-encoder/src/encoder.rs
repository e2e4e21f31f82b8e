//! `QueryEncoder`: one entry point for every query modality.

use std::{future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use tokio::task;
use tracing::{debug, info, instrument};

use crate::config::EncoderConfig;
use crate::errors::EncodeError;
use crate::fetch::ImageFetcher;
use crate::model::{ClipModel, Projection};
use crate::preprocess::{PreprocessConfig, decode_image};
use crate::query::{EmbeddingVector, Query};

/// Asynchronous query encoder.
///
/// Async because URL queries perform network I/O and inference is moved off
/// the request thread.
pub trait QueryEncoder: Send + Sync {
    fn encode<'a>(
        &'a self,
        query: &'a Query,
    ) -> Pin<Box<dyn Future<Output = Result<EmbeddingVector, EncodeError>> + Send + 'a>>;
}

/// Production encoder over a [`Projection`] (normally [`ClipModel`]).
pub struct ClipEncoder<P: Projection> {
    projection: Arc<P>,
    preprocess: PreprocessConfig,
    fetcher: ImageFetcher,
    expected_dim: Option<usize>,
}

impl ClipEncoder<ClipModel> {
    /// Loads the ONNX model described by `cfg` and wires the fetcher.
    ///
    /// Blocking; call once at startup.
    pub fn from_config(cfg: &EncoderConfig) -> Result<Self, EncodeError> {
        cfg.validate()?;
        let model = ClipModel::load(cfg)?;
        info!(model = model.model_id(), dim = ?cfg.expected_dim, "clip_encoder: ready");
        let preprocess = model.preprocess_config().clone();
        let fetcher = ImageFetcher::new(cfg.fetch_timeout, cfg.fetch_max_bytes)?;
        Ok(Self::new(model, preprocess, fetcher, cfg.expected_dim))
    }
}

impl<P: Projection> ClipEncoder<P> {
    pub fn new(
        projection: P,
        preprocess: PreprocessConfig,
        fetcher: ImageFetcher,
        expected_dim: Option<usize>,
    ) -> Self {
        Self {
            projection: Arc::new(projection),
            preprocess,
            fetcher,
            expected_dim,
        }
    }

    async fn encode_text(&self, text: &str) -> Result<EmbeddingVector, EncodeError> {
        if text.trim().is_empty() {
            return Err(EncodeError::InvalidInput("query text is empty".into()));
        }

        let projection = Arc::clone(&self.projection);
        let text = text.to_owned();
        let v = task::spawn_blocking(move || projection.embed_text(&text))
            .await
            .map_err(|e| EncodeError::Inference(format!("text worker failed: {e}")))??;

        self.check_dim(v)
    }

    async fn encode_image(&self, bytes: Bytes) -> Result<EmbeddingVector, EncodeError> {
        let projection = Arc::clone(&self.projection);
        let preprocess = self.preprocess.clone();
        let v = task::spawn_blocking(move || {
            let image = decode_image(&bytes)?;
            let pixels = preprocess.pixel_values(&image);
            projection.embed_pixels(pixels)
        })
        .await
        .map_err(|e| EncodeError::Inference(format!("image worker failed: {e}")))??;

        self.check_dim(v)
    }

    fn check_dim(&self, v: EmbeddingVector) -> Result<EmbeddingVector, EncodeError> {
        match self.expected_dim {
            Some(want) if v.len() != want => Err(EncodeError::DimensionMismatch {
                got: v.len(),
                want,
            }),
            _ => Ok(v),
        }
    }
}

impl<P: Projection> QueryEncoder for ClipEncoder<P> {
    fn encode<'a>(
        &'a self,
        query: &'a Query,
    ) -> Pin<Box<dyn Future<Output = Result<EmbeddingVector, EncodeError>> + Send + 'a>> {
        Box::pin(self.encode_query(query))
    }
}

impl<P: Projection> ClipEncoder<P> {
    #[instrument(skip_all, fields(modality = query.modality()))]
    async fn encode_query(&self, query: &Query) -> Result<EmbeddingVector, EncodeError> {
        let v = match query {
            Query::Text(text) => self.encode_text(text).await?,
            Query::ImageBlob(bytes) => self.encode_image(bytes.clone()).await?,
            Query::ImageUrl(url) => {
                let bytes = self.fetcher.fetch(url).await?;
                self.encode_image(bytes).await?
            }
        };
        debug!(dim = v.len(), "encode: done");
        Ok(v)
    }
}
