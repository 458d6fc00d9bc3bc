pub mod geocode;
pub mod live;
pub mod routing;

use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

/// Upstream request log for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequestLog {
    /// Unique request ID
    pub id: String,
    /// Timestamp when request was made
    pub timestamp: String,
    /// Provider endpoint called (e.g. "nominatim/search")
    pub endpoint: String,
    /// Request parameters
    pub params: Option<HashMap<String, String>>,
    /// Duration of request in milliseconds
    pub duration_ms: u64,
    /// HTTP status code (0 when the request never completed)
    pub status: u16,
    /// Response size in bytes
    pub response_size: Option<usize>,
    /// Error message if request failed
    pub error: Option<String>,
}

/// Sender for provider request diagnostics
pub type ProviderRequestSender = broadcast::Sender<ProviderRequestLog>;

/// Shared HTTP client for the external geocoding/routing/live lookups.
///
/// Every request emits a [`ProviderRequestLog`] on the diagnostics channel
/// regardless of outcome; send errors are ignored because they only mean no
/// one is listening.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    diagnostics_tx: ProviderRequestSender,
}

impl ProviderClient {
    pub fn new(diagnostics_tx: ProviderRequestSender) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("digimarg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            diagnostics_tx,
        })
    }

    fn log_request(&self, log: ProviderRequestLog) {
        let _ = self.diagnostics_tx.send(log);
    }

    /// GET `url` and deserialize the JSON body, logging the request outcome.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        params: HashMap<String, String>,
    ) -> Result<T, ProviderError> {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.log_request(ProviderRequestLog {
                    id: request_id,
                    timestamp: Utc::now().to_rfc3339(),
                    endpoint: endpoint.to_string(),
                    params: Some(params),
                    duration_ms: start.elapsed().as_millis() as u64,
                    status: 0,
                    response_size: None,
                    error: Some(e.to_string()),
                });
                return Err(ProviderError::NetworkError(e.to_string()));
            }
        };

        let status = response.status().as_u16();

        if !response.status().is_success() {
            self.log_request(ProviderRequestLog {
                id: request_id,
                timestamp: Utc::now().to_rfc3339(),
                endpoint: endpoint.to_string(),
                params: Some(params),
                duration_ms: start.elapsed().as_millis() as u64,
                status,
                response_size: None,
                error: Some(format!("HTTP error: {}", status)),
            });
            return Err(ProviderError::ApiError(format!("HTTP error: {}", status)));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                self.log_request(ProviderRequestLog {
                    id: request_id,
                    timestamp: Utc::now().to_rfc3339(),
                    endpoint: endpoint.to_string(),
                    params: Some(params),
                    duration_ms: start.elapsed().as_millis() as u64,
                    status,
                    response_size: None,
                    error: Some(format!("Failed to read body: {}", e)),
                });
                return Err(ProviderError::NetworkError(e.to_string()));
            }
        };

        let response_size = body.len();
        let result: Result<T, _> = serde_json::from_str(&body);

        match &result {
            Ok(_) => {
                self.log_request(ProviderRequestLog {
                    id: request_id,
                    timestamp: Utc::now().to_rfc3339(),
                    endpoint: endpoint.to_string(),
                    params: Some(params),
                    duration_ms: start.elapsed().as_millis() as u64,
                    status,
                    response_size: Some(response_size),
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(
                    endpoint,
                    error = %e,
                    body = &body[..body.len().min(500)],
                    "Failed to parse provider response"
                );
                self.log_request(ProviderRequestLog {
                    id: request_id,
                    timestamp: Utc::now().to_rfc3339(),
                    endpoint: endpoint.to_string(),
                    params: Some(params),
                    duration_ms: start.elapsed().as_millis() as u64,
                    status,
                    response_size: Some(response_size),
                    error: Some(format!("Parse error: {}", e)),
                });
            }
        }

        result.map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}
