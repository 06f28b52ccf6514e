//! Proxy fetch engine: retrieval of the registered upstream resource.

use bytes::{Bytes, BytesMut};
use ferry_core::config::UpstreamConfig;
use ferry_core::{AuthMode, Registration};
use thiserror::Error;

/// Fetch failure modes.
///
/// Connection failures, resets, mid-transfer errors, timeouts, and local
/// errors while initiating the request all collapse into `Download`; the
/// caller is never told which one happened. A non-200 upstream answer is
/// the only distinct signal, and the original status is not preserved
/// beyond diagnostics.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    #[error("download failed: {0}")]
    Download(String),
}

/// A completely retrieved upstream payload with its response metadata.
#[derive(Debug)]
pub struct FetchedFile {
    pub body: Bytes,
    pub content_type: String,
    pub download_name: Option<String>,
}

/// Retrieves upstream resources for live registrations.
///
/// One engine (and one HTTP client) is shared across all requests. The
/// shared basic-auth credential pair is injected from configuration; it is
/// never read from the registration record.
pub struct FetchEngine {
    client: reqwest::Client,
    username: String,
    password: String,
}

impl FetchEngine {
    /// Build the engine and its HTTP client from configuration.
    pub fn new(config: &UpstreamConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Fetch the upstream resource for a live (non-expired) registration.
    ///
    /// The body is accumulated chunk-by-chunk in arrival order and only
    /// returned once the upstream transfer has completed: nothing reaches
    /// the caller before the outcome is known.
    pub async fn fetch(&self, record: &Registration) -> Result<FetchedFile, FetchError> {
        let mut request = self.client.get(&record.target_url);
        if record.auth_mode == AuthMode::Basic {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let mut response = request.send().await.map_err(|e| {
            tracing::warn!(id = %record.id, error = %e, "Upstream request failed");
            FetchError::Download(e.to_string())
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!(id = %record.id, status = %status, "Upstream returned non-200");
            return Err(FetchError::UpstreamStatus(status));
        }

        let mut body = BytesMut::with_capacity(response.content_length().unwrap_or(0) as usize);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "Upstream transfer failed mid-stream");
                    return Err(FetchError::Download(e.to_string()));
                }
            }
        }

        tracing::debug!(id = %record.id, bytes = body.len(), "Upstream transfer complete");
        Ok(FetchedFile {
            body: body.freeze(),
            content_type: record.content_type.clone(),
            download_name: record.download_name.clone(),
        })
    }
}
