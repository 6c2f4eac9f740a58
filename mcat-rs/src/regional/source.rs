//! External regional source adapter
//!
//! Fetches the authoritative regional list over HTTP. Any failure (network,
//! timeout, non-2xx, malformed body) is a [`SourceError`], which callers
//! treat as "do not reconcile this cycle", never as "the list is empty".
//!
//! # Response format
//! Either a bare JSON array of records or an object wrapping it:
//! ```json
//! [{"external_id": "R1", "name": "North", "attributes": {"code": "N"}}]
//! {"regionals": [{"external_id": "R1", "name": "North"}]}
//! ```

use super::model::RegionalRecord;
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{header, Client};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// User-Agent header sent to the source
const USER_AGENT: &str = concat!("mcat-rs/", env!("CARGO_PKG_VERSION"));

/// Why a fetch produced no usable list
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no regional source configured")]
    NotConfigured,

    #[error("request to regional source failed: {0}")]
    Network(String),

    #[error("regional source did not respond within {0:?}")]
    Timeout(Duration),

    #[error("regional source returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse regional source response: {0}")]
    Parse(String),

    #[error("invalid regional source configuration: {0}")]
    Config(String),
}

/// Provider of the authoritative regional list
#[async_trait]
pub trait RegionalSource: Send + Sync {
    /// Fetch the complete current list
    async fn fetch_all(&self) -> Result<Vec<RegionalRecord>, SourceError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourcePayload {
    Bare(Vec<RegionalRecord>),
    Wrapped { regionals: Vec<RegionalRecord> },
}

impl SourcePayload {
    fn into_records(self) -> Vec<RegionalRecord> {
        match self {
            SourcePayload::Bare(records) => records,
            SourcePayload::Wrapped { regionals } => regionals,
        }
    }
}

/// Parse a source response body
pub fn parse_payload(body: &[u8]) -> Result<Vec<RegionalRecord>, SourceError> {
    serde_json::from_slice::<SourcePayload>(body)
        .map(SourcePayload::into_records)
        .map_err(|e| SourceError::Parse(e.to_string()))
}

/// HTTP source with a bounded timeout and client-side rate limit
pub struct HttpRegionalSource {
    http_client: Client,
    url: String,
    timeout: Duration,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpRegionalSource {
    /// Create a client for `url`
    ///
    /// `requests_per_minute` caps how often the source is hit, including
    /// back-to-back on-demand runs.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self, SourceError> {
        let url = url.into();
        reqwest::Url::parse(&url).map_err(|e| SourceError::Config(format!("{}: {}", url, e)))?;

        let rate = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            SourceError::Config("requests_per_minute must be greater than zero".to_string())
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| SourceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url,
            timeout,
            rate_limiter: RateLimiter::direct(Quota::per_minute(rate)),
        })
    }

    fn request_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl RegionalSource for HttpRegionalSource {
    async fn fetch_all(&self) -> Result<Vec<RegionalRecord>, SourceError> {
        self.rate_limiter.until_ready().await;

        debug!(url = %self.url, "Fetching regional list");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(e))?;

        let records = parse_payload(&body)?;
        debug!(url = %self.url, count = records.len(), "Regional list fetched");

        Ok(records)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Stand-in used when no source URL is configured; every fetch fails
pub struct UnconfiguredSource;

#[async_trait]
impl RegionalSource for UnconfiguredSource {
    async fn fetch_all(&self) -> Result<Vec<RegionalRecord>, SourceError> {
        Err(SourceError::NotConfigured)
    }

    fn describe(&self) -> String {
        "<unconfigured>".to_string()
    }
}
