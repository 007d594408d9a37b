//! Client side of the scanner HTTP API. Lets a front end drive scans through a
//! running `scanner` service with the same `ScreeningService` seam used in-process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::api::routes::{HealthResponse, LatencyResponse};
use crate::config::GEMINI_TIMEOUT_SECS;
use crate::error::{ErrorBody, ScanError};
use crate::screener::ScreeningService;
use crate::types::{ScanResult, StrategyConfig};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";

pub struct HttpScreener {
    client: Client,
    base_url: String,
}

impl HttpScreener {
    /// The request timeout leaves headroom over the service's own model timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScanError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GEMINI_TIMEOUT_SECS + 10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ScanError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse, ScanError> {
        let resp = self.client.get(format!("{}/health", self.base_url)).send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    pub async fn latency(&self) -> Result<LatencyResponse, ScanError> {
        let resp = self
            .client
            .get(format!("{}/stats/latency", self.base_url))
            .send()
            .await?;
        Ok(resp.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl ScreeningService for HttpScreener {
    async fn request_screening(&self, config: &StrategyConfig) -> Result<ScanResult, ScanError> {
        let resp = self
            .client
            .post(format!("{}/scan", self.base_url))
            .json(config)
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await?;
        if status.is_success() {
            return serde_json::from_str(&raw)
                .map_err(|e| ScanError::Transport(format!("undecodable scan response: {e}")));
        }

        debug!(status = status.as_u16(), "scanner service returned an error");
        match serde_json::from_str::<ErrorBody>(&raw) {
            Ok(body) => Err(ScanError::from_kind(body.kind, body.detail)),
            Err(_) => Err(ScanError::Transport(format!("scanner returned {status}"))),
        }
    }
}
