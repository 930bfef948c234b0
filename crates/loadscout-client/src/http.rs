//! reqwest-backed [`PresenceClient`].
//!
//! # Example
//!
//! ```no_run
//! use loadscout_client::{HttpClientConfig, HttpPresenceClient};
//! use loadscout_core::{ClientId, PresenceClient};
//!
//! # async fn run() -> loadscout_core::CoreResult<()> {
//! let client = HttpPresenceClient::new(HttpClientConfig::new("http://localhost:8080"))?;
//! let outcome = client.send_heartbeat(&ClientId::from("user1")).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use loadscout_core::{ClientId, CoreError, CoreResult, Outcome, PresenceClient};
use reqwest::StatusCode;
use serde::Serialize;

/// Connection settings for [`HttpPresenceClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL, e.g. `http://localhost:8080`
    pub base_url: String,

    /// Upper bound for a single call, connect through body
    pub request_timeout: Duration,

    /// Idle keep-alive connections retained per host
    pub max_idle_per_host: usize,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(5),
            max_idle_per_host: 1024,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatRequest<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest<'a> {
    user_ids: Vec<&'a str>,
}

/// Presence service client over HTTP/JSON.
///
/// Owns one connection pool; construct it once and share it through `Arc`.
/// Every call is a single attempt bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpPresenceClient {
    http: reqwest::Client,
    heartbeat_url: String,
    status_url: String,
}

impl HttpPresenceClient {
    /// Build a client handle.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` for an empty base URL or a zero
    /// timeout, and `CoreError::Client` when the HTTP stack cannot be built.
    pub fn new(config: HttpClientConfig) -> CoreResult<Self> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(CoreError::invalid_config("target URL must not be empty"));
        }
        if config.request_timeout.is_zero() {
            return Err(CoreError::invalid_config("request timeout must be > 0"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .map_err(|e| CoreError::client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            heartbeat_url: format!("{base}/heartbeat"),
            status_url: format!("{base}/status"),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T, operation: &str) -> Outcome {
        let start = Instant::now();

        let response = match self.http.post(url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                let latency = start.elapsed();
                tracing::debug!(operation, error = %e, "request failed");
                return Outcome::transport(describe(operation, &e), latency);
            }
        };

        let status = response.status();

        // Latency covers the full body, not just the headers.
        if let Err(e) = response.bytes().await {
            return Outcome::transport(describe(operation, &e), start.elapsed());
        }
        let latency = start.elapsed();

        if status != StatusCode::OK {
            return Outcome::protocol(
                status.as_u16(),
                format!("{operation} failed with status: {}", status.as_u16()),
                latency,
            );
        }

        Outcome::success(latency)
    }
}

fn describe(operation: &str, error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("{operation} timed out: {error}")
    } else if error.is_connect() {
        format!("{operation} connection failed: {error}")
    } else {
        format!("{operation} request error: {error}")
    }
}

#[async_trait]
impl PresenceClient for HttpPresenceClient {
    async fn send_heartbeat(&self, id: &ClientId) -> Outcome {
        let body = HeartbeatRequest {
            user_id: id.as_str(),
        };
        self.post(&self.heartbeat_url, &body, "heartbeat").await
    }

    async fn send_status_batch(&self, ids: &[ClientId]) -> Outcome {
        let body = StatusRequest {
            user_ids: ids.iter().map(ClientId::as_str).collect(),
        };
        self.post(&self.status_url, &body, "status check").await
    }
}
