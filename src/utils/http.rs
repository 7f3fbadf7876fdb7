// src/utils/http.rs

//! HTTP client utilities.
//!
//! The fetcher talks to the network through the [`Transport`] trait so that
//! retry and pacing logic can be exercised without a live upstream.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::error::Result;
use crate::models::UpstreamConfig;

/// Why a single GET attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// HTTP 429 from the upstream
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// Any other non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connection, timeout or body read failure
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// One raw GET against the upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the response body on a 2xx status.
    async fn get_text(&self, url: &str) -> std::result::Result<String, TransportError>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build the client from configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_text(&self, url: &str) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}
