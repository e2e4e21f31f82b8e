use std::sync::Arc;

use clip_encoder::{ClipEncoder, EncoderConfig};
use search_pipeline::{ResultMapper, SearchPipeline};
use tracing::info;
use vector_index::IndexConfig;

use crate::core::app_config::AppConfig;
use crate::error_handler::AppError;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SearchPipeline,
}

impl AppState {
    pub fn new(pipeline: SearchPipeline) -> Self {
        Self { pipeline }
    }

    /// Loads the model, opens the index, and wires the pipeline.
    ///
    /// Any failure here is fatal: the service does not start half-configured.
    pub async fn from_env(cfg: &AppConfig) -> Result<Self, AppError> {
        let encoder_cfg = EncoderConfig::from_env()?;
        let index_cfg = IndexConfig::from_env()?;

        info!(model = %encoder_cfg.model_id, "app_state: loading encoder");
        let encoder = tokio::task::spawn_blocking(move || ClipEncoder::from_config(&encoder_cfg))
            .await
            .map_err(|e| AppError::Startup(format!("encoder loader panicked: {e}")))??;

        let index = vector_index::connect(&index_cfg).await?;

        let mapper = ResultMapper::new(cfg.image_server.clone(), cfg.mapping_policy);
        info!(
            backend = index.backend(),
            policy = ?cfg.mapping_policy,
            "app_state: pipeline ready"
        );

        Ok(Self::new(SearchPipeline::new(Arc::new(encoder), index, mapper)))
    }
}
