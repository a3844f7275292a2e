//! Detection Backend Client
//!
//! Async HTTP access to the detection backend: detection-status polling,
//! log-detection submission and incident detail lookup.

use crate::error::DetectionError;
use crate::types::{IncidentDetail, LogDetectionRequest, LogDetectionResponse, RemoteErrorBody, Sample};
use crate::endpoint;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Operations the alert pipeline needs from the backend
#[async_trait]
pub trait DetectionApi: Send + Sync {
    /// Fetch the latest detection snapshot
    async fn detection_status(&self) -> Result<Sample, DetectionError>;

    /// Submit one detection for remote logging
    async fn log_detection(
        &self,
        credential: &str,
        request: &LogDetectionRequest,
    ) -> Result<LogDetectionResponse, DetectionError>;

    /// Fetch full incident detail
    async fn incident(&self, credential: &str, incident_id: i64) -> Result<IncidentDetail, DetectionError>;
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// reqwest-backed implementation of [`DetectionApi`]
#[derive(Clone)]
pub struct HttpDetectionClient {
    http: Client,
    base_url: String,
}

impl HttpDetectionClient {
    /// Create a new client
    pub fn new(config: &ClientConfig) -> Result<Self, DetectionError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| DetectionError::Config(e.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!("Creating detection client for {}", base_url);

        Ok(Self { http, base_url })
    }

    /// Backend base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Decode a success body, or turn a non-success status into `Rejected`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DetectionError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<RemoteErrorBody>(&bytes)
            .map(|body| body.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        return Err(DetectionError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl DetectionApi for HttpDetectionClient {
    async fn detection_status(&self) -> Result<Sample, DetectionError> {
        let response = self.http.get(self.url(endpoint::DETECTION_STATUS)).send().await?;
        decode(response).await
    }

    async fn log_detection(
        &self,
        credential: &str,
        request: &LogDetectionRequest,
    ) -> Result<LogDetectionResponse, DetectionError> {
        debug!(
            weapon_type = %request.weapon_type,
            confidence = request.confidence_score,
            "Submitting detection log"
        );
        let response = self
            .http
            .post(self.url(endpoint::LOG_DETECTION))
            .bearer_auth(credential)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn incident(&self, credential: &str, incident_id: i64) -> Result<IncidentDetail, DetectionError> {
        let response = self
            .http
            .get(self.url(&endpoint::incident(incident_id)))
            .bearer_auth(credential)
            .send()
            .await?;
        decode(response).await
    }
}
