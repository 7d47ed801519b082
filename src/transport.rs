//! HTTP transport to the hosted chatbot endpoint.
//!
//! The dispatcher talks to [`ChatTransport`] only, so retry and session
//! logic can be exercised against scripted transports in tests.

use std::time::Duration;

use tracing::debug;

use crate::config::DispatchConfig;
use crate::error::ChatError;
use crate::types::ChatRequest;

/// Raw HTTP answer: status plus undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// Why an attempt produced no usable reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Attach the attempt counter and map to the caller-facing error.
    #[must_use]
    pub fn classify(self, attempt: u32, max: u32) -> ChatError {
        match self {
            Self::Timeout => ChatError::Timeout { attempt, max },
            Self::Network(detail) => ChatError::Network { attempt, max, detail },
            Self::Status { status, reason } => ChatError::HttpStatus { status, reason, attempt, max },
            Self::Other(detail) => ChatError::Unknown { detail, attempt, max },
        }
    }
}

#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// `POST` one chat turn.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] for timeouts, connection failures, and
    /// non-success HTTP statuses.
    async fn post_chat(&self, request: &ChatRequest) -> Result<TransportReply, TransportError>;

    /// Probe the endpoint's health route. Any failure reads as unhealthy.
    async fn health(&self) -> bool;
}

// =============================================================================
// REQWEST IMPLEMENTATION
// =============================================================================

pub struct HttpTransport {
    http: reqwest::Client,
    api_url: String,
    health_url: String,
    health_timeout: Duration,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`ChatError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &DispatchConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            health_url: health_url(&config.api_url),
            health_timeout: config.health_timeout,
        })
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn post_chat(&self, request: &ChatRequest) -> Result<TransportReply, TransportError> {
        let response = self
            .http
            .post(&self.api_url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "chat endpoint returned error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(TransportReply { status: status.as_u16(), body })
    }

    async fn health(&self) -> bool {
        match self
            .http
            .get(&self.health_url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16() == 200,
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() || e.is_request() {
        TransportError::Network(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Swap a trailing `/chat` path segment for `/health`.
#[must_use]
pub fn health_url(api_url: &str) -> String {
    let trimmed = api_url.trim_end_matches('/');
    match trimmed.strip_suffix("/chat") {
        Some(base) => format!("{base}/health"),
        None => format!("{trimmed}/health"),
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
