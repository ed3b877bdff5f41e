//! HTTP transport for the token endpoint.

use crate::error::{RedirectError, RedirectResult, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Status and decoded body of a token endpoint response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// JSON body; a non-JSON error body is kept as a JSON string
    pub json: serde_json::Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs POST requests on behalf of the callback flow.
///
/// Implementations apply their own timeouts; the flow never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] over a `reqwest` client
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new(http_timeout_seconds: u64) -> RedirectResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(http_timeout_seconds))
            .build()
            .map_err(|e| RedirectError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        body: String,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.http_client.post(url).body(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(status, "Token endpoint responded");

        let json = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => json,
            Err(e) if (200..300).contains(&status) => {
                return Err(TransportError::InvalidResponse(e.to_string()));
            }
            Err(_) => serde_json::Value::String(text),
        };

        Ok(TransportResponse { status, json })
    }
}
