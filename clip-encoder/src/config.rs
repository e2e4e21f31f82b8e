//! Configuration layer: reads encoder settings from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::EncodeError;

/// Runtime configuration for the CLIP encoder.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Model identifier, e.g. `openai/clip-vit-base-patch32`.
    pub model_id: String,
    /// Root directory holding one sub-directory per model identifier.
    pub models_dir: PathBuf,
    /// Expected embedding length; every produced vector is checked when set.
    pub expected_dim: Option<usize>,
    /// Intra-op threads per ONNX session.
    pub inference_threads: usize,
    /// Upper bound on a remote image download.
    pub fetch_timeout: Duration,
    /// Largest accepted remote image body, in bytes.
    pub fetch_max_bytes: usize,
}

impl EncoderConfig {
    /// Creates a config for `model_id` with default knobs.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            models_dir: PathBuf::from("models"),
            expected_dim: None,
            inference_threads: 4,
            fetch_timeout: Duration::from_secs(10),
            fetch_max_bytes: 20 * 1024 * 1024,
        }
    }

    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `MODEL_ID` (required)
    /// - `MODELS_DIR` (default: "models")
    /// - `EMBEDDING_DIM` (optional)
    /// - `INFERENCE_THREADS` (default: 4)
    /// - `IMAGE_FETCH_TIMEOUT_SECS` (default: 10)
    /// - `IMAGE_FETCH_MAX_BYTES` (default: 20 MiB)
    pub fn from_env() -> Result<Self, EncodeError> {
        let model_id = std::env::var("MODEL_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EncodeError::Config("missing env variable: MODEL_ID".into()))?;

        let mut cfg = Self::new(model_id.trim());

        if let Ok(dir) = std::env::var("MODELS_DIR") {
            if !dir.trim().is_empty() {
                cfg.models_dir = PathBuf::from(dir);
            }
        }
        cfg.expected_dim = read_usize_env("EMBEDDING_DIM")?;
        if let Some(n) = read_usize_env("INFERENCE_THREADS")? {
            cfg.inference_threads = n;
        }
        if let Some(secs) = read_usize_env("IMAGE_FETCH_TIMEOUT_SECS")? {
            cfg.fetch_timeout = Duration::from_secs(secs as u64);
        }
        if let Some(n) = read_usize_env("IMAGE_FETCH_MAX_BYTES")? {
            cfg.fetch_max_bytes = n;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.model_id.trim().is_empty() {
            return Err(EncodeError::Config("model_id is empty".into()));
        }
        if self.expected_dim == Some(0) {
            return Err(EncodeError::Config("EMBEDDING_DIM must be > 0".into()));
        }
        if self.inference_threads == 0 {
            return Err(EncodeError::Config("INFERENCE_THREADS must be > 0".into()));
        }
        if self.fetch_max_bytes == 0 {
            return Err(EncodeError::Config("IMAGE_FETCH_MAX_BYTES must be > 0".into()));
        }
        Ok(())
    }

    /// Directory holding the model files: `<models_dir>/<model_id>`.
    pub fn model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.model_id)
    }
}

/// Read an optional `usize` from env; unset or empty yields `Ok(None)`.
fn read_usize_env(key: &str) -> Result<Option<usize>, EncodeError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| EncodeError::Config(format!("failed to parse env variable: {key} = '{v}'"))),
        _ => Ok(None),
    }
}
