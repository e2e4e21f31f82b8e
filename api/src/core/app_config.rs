//! HTTP surface configuration.

use search_pipeline::MappingPolicy;
use thiserror::Error;

/// Errors raised while reading the service configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing env variable: {0}")]
    Missing(&'static str),

    #[error("failed to parse env variable: {key} = '{value}'")]
    Parse { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Listen address, e.g. `0.0.0.0:8000`.
    pub address: String,
    /// Thumbnail URL prefix; `<image_server><id>.jpg` is emitted verbatim.
    pub image_server: String,
    pub mapping_policy: MappingPolicy,
    /// Request body limit, uploads included.
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load config from environment variables.
    ///
    /// - `API_ADDRESS` (default: "0.0.0.0:8000")
    /// - `IMAGE_SERVER` (required)
    /// - `MAPPING_POLICY` (`strict` | `skip`, default: `strict`)
    /// - `MAX_UPLOAD_BYTES` (default: 20 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        let address = env_string("API_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".into());
        let image_server = env_string("IMAGE_SERVER").ok_or(ConfigError::Missing("IMAGE_SERVER"))?;

        let mapping_policy = match env_string("MAPPING_POLICY") {
            Some(v) => v.parse().map_err(|_| ConfigError::Parse {
                key: "MAPPING_POLICY",
                value: v,
            })?,
            None => MappingPolicy::default(),
        };

        let max_upload_bytes = match env_string("MAX_UPLOAD_BYTES") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Parse {
                        key: "MAX_UPLOAD_BYTES",
                        value: v,
                    });
                }
            },
            None => 20 * 1024 * 1024,
        };

        Ok(Self {
            address,
            image_server,
            mapping_policy,
            max_upload_bytes,
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
