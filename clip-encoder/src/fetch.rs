//! Remote image retrieval for URL queries.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::errors::EncodeError;

/// Bounded HTTP(S) downloader. One pooled client per encoder.
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, EncodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EncodeError::Config(format!("http client: {e}")))?;
        Ok(Self { client, max_bytes })
    }

    /// Downloads the body at `url`.
    ///
    /// # Errors
    /// - [`EncodeError::InvalidInput`] when `url` is not an absolute http(s) URL.
    /// - [`EncodeError::Retrieval`] on transport failure, non-2xx status, or a
    ///   body larger than the configured bound.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, EncodeError> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| EncodeError::InvalidInput(format!("bad image url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EncodeError::InvalidInput(format!(
                "unsupported url scheme: {}",
                parsed.scheme()
            )));
        }

        debug!(url = %parsed, "image_fetcher.fetch: start");

        let mut resp = self.client.get(parsed.clone()).send().await.map_err(|e| {
            warn!(url = %parsed, error = %e, "image_fetcher.fetch: transport error");
            EncodeError::Retrieval(format!("request failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(url = %parsed, %status, "image_fetcher.fetch: non-success status");
            return Err(EncodeError::Retrieval(format!("remote returned {status}")));
        }

        if let Some(len) = resp.content_length() {
            if len as usize > self.max_bytes {
                return Err(EncodeError::Retrieval(format!(
                    "remote image is {len} bytes, limit is {}",
                    self.max_bytes
                )));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| EncodeError::Retrieval(format!("body read failed: {e}")))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(EncodeError::Retrieval(format!(
                    "remote image exceeds {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %parsed, bytes = body.len(), "image_fetcher.fetch: done");
        Ok(body.freeze())
    }
}
