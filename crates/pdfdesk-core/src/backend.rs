//! Ollama reachability check and model listing.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Upper bound for a status probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Client for the Ollama native status endpoint (`/api/tags`)
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
}

impl OllamaClient {
    /// Create a client with the default 5 second timeout.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created, which should only happen
    /// in extreme circumstances (e.g., TLS backend unavailable on the system).
    pub fn new() -> Self {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    /// # Panics
    /// Panics if the HTTP client cannot be created.
    #[allow(clippy::expect_used)]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    fn tags_url(base_url: &str) -> String {
        format!("{}/api/tags", base_url.trim_end_matches('/'))
    }

    async fn get_tags(&self, base_url: &str) -> Result<reqwest::Response> {
        let url = Self::tags_url(base_url);
        debug!("Probing {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Backend probe to {} failed: {}", url, e);
            Error::BackendUnreachable(e.to_string())
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Backend probe to {} returned {}", url, status);
            return Err(Error::BackendUnreachable(format!("HTTP {}", status.as_u16())));
        }

        Ok(response)
    }

    /// One status request; `Ok` means reachable. No retries.
    pub async fn probe(&self, base_url: &str) -> Result<()> {
        self.get_tags(base_url).await?;
        info!("Connected to Ollama at {}", base_url);
        Ok(())
    }

    /// Reachability as a flag, for callers that only render a status.
    pub async fn is_reachable(&self, base_url: &str) -> bool {
        self.probe(base_url).await.is_ok()
    }

    /// Names of the models the server has pulled.
    pub async fn list_models(&self, base_url: &str) -> Result<Vec<String>> {
        let response = self.get_tags(base_url).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::BackendInvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_url_trims_trailing_slash() {
        assert_eq!(
            OllamaClient::tags_url("http://localhost:11434/"),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            OllamaClient::tags_url("http://localhost:11434"),
            "http://localhost:11434/api/tags"
        );
    }

    #[tokio::test]
    async fn test_probe_refused_connection_is_unreachable() {
        // Port 9 (discard) is essentially never listening on loopback
        let client = OllamaClient::with_timeout(Duration::from_millis(500));
        let err = client.probe("http://127.0.0.1:9").await.unwrap_err();
        assert!(matches!(err, Error::BackendUnreachable(_)));
    }
}
