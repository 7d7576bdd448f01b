use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::error::RelayError;

/// Carries a local offer to the remote side and returns its answer
#[async_trait]
pub trait SignalingClient: Send + Sync {
    async fn exchange(&self, offer: &str) -> Result<String>;
}

/// Posts the offer as `application/sdp` and reads the answer from the body
pub struct HttpSignalingClient {
    client: reqwest::Client,
    url: String,
    bearer: Option<String>,
}

impl HttpSignalingClient {
    pub fn new(url: impl Into<String>, bearer: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            bearer,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SignalingClient for HttpSignalingClient {
    async fn exchange(&self, offer: &str) -> Result<String> {
        info!("Posting {} byte offer to {}", offer.len(), self.url);

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer.to_string());
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach signaling endpoint {}", self.url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read signaling response")?;

        if !status.is_success() {
            return Err(RelayError::Signaling(format!("{} returned {}: {}", self.url, status, body)).into());
        }

        info!("Received {} byte answer ({})", body.len(), status);
        Ok(body)
    }
}
