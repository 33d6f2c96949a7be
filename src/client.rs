// src/client.rs
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::error::ProviderError;

const REDACTED_PARAMS: [&str; 3] = ["apikey", "api_key", "token"];
const BODY_SNIPPET_CHARS: usize = 200;

/// One outbound GET against one provider endpoint.
#[derive(Debug, Clone)]
pub struct RemoteRequest {
    pub provider: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Overrides the client's default timeout for this call only.
    pub timeout: Option<Duration>,
}

impl RemoteRequest {
    pub fn get(provider: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {}", token))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// URL safe to log: credential query values are masked.
    pub fn redacted_url(&self) -> String {
        let Ok(mut url) = Url::parse(&self.url) else {
            return self.url.split('?').next().unwrap_or_default().to_string();
        };
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let masked = REDACTED_PARAMS.contains(&k.to_ascii_lowercase().as_str());
                (k.into_owned(), if masked { "***".to_string() } else { v.into_owned() })
            })
            .collect();
        if pairs.is_empty() {
            return url.to_string();
        }
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

/// Raw request/response exchange. Implementations must be cancellation safe:
/// dropping the returned future abandons the in-flight request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, ProviderError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("market-data-tools/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, ProviderError> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| ProviderError::Transport {
            provider: request.provider.clone(),
            message: if e.is_connect() {
                format!("connection failed: {}", e.without_url())
            } else {
                e.without_url().to_string()
            },
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ProviderError::Transport {
            provider: request.provider.clone(),
            message: format!("failed to read response body: {}", e.without_url()),
        })?;

        Ok(RemoteResponse { status, body })
    }
}

/// Bounded Remote Call: one request, hard timeout, decoded JSON or a typed failure.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn get_json(&self, request: RemoteRequest) -> Result<Value, ProviderError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let started = Instant::now();
        debug!("🌐 {} GET {}", request.provider, request.redacted_url());

        // Elapsing drops the transport future, which aborts the request.
        let response = match tokio::time::timeout(timeout, self.transport.send(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "⏱️ {} timed out after {}ms: {}",
                    request.provider,
                    timeout.as_millis(),
                    request.redacted_url()
                );
                return Err(ProviderError::Timeout {
                    provider: request.provider,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        if !(200..300).contains(&response.status) {
            debug!(
                "❌ {} HTTP {}: {}",
                request.provider,
                response.status,
                snippet(&response.body)
            );
            return Err(ProviderError::Http {
                provider: request.provider,
                status: response.status,
            });
        }

        let value = serde_json::from_str::<Value>(&response.body).map_err(|e| {
            ProviderError::Decode {
                provider: request.provider.clone(),
                message: e.to_string(),
            }
        })?;

        debug!(
            "✅ {} answered in {}ms ({} bytes)",
            request.provider,
            started.elapsed().as_millis(),
            response.body.len()
        );
        Ok(value)
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_url_masks_credentials_only() {
        let request = RemoteRequest::get(
            "fmp",
            "https://financialmodelingprep.com/api/v3/quote/AAPL?apikey=secret&limit=5",
        );
        let redacted = request.redacted_url();
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("apikey=***"));
        assert!(redacted.contains("limit=5"));
    }

    #[test]
    fn bearer_populates_authorization_header() {
        let request = RemoteRequest::get("watchlist", "https://example.test/list").with_bearer("t-1");
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer t-1")
        );
    }
}
