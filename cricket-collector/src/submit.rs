//! Submission of metrics snapshots to the ingestion API
//!
//! One authenticated POST per snapshot. Only `201 Created` counts as success;
//! failures are returned to the caller and never retried here.

use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to marshal metrics: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to send metrics: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metrics submission failed with status {}: {body}", .status.as_u16())]
    Rejected { status: StatusCode, body: String },
}

/// HTTP client bound to one ingestion endpoint and API key
#[derive(Clone)]
pub struct IngestClient {
    http: Client,
    url: String,
    api_key: String,
}

impl fmt::Debug for IngestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestClient")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl IngestClient {
    pub fn new(config: &Config) -> Result<Self, SubmitError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("cricket-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url: config.ingest_url(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one snapshot
    pub async fn submit(&self, snapshot: &MetricsSnapshot) -> Result<(), SubmitError> {
        let body = serde_json::to_vec(snapshot)?;

        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected { status, body });
        }

        Ok(())
    }
}
