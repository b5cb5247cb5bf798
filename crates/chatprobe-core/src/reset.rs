//! Client for the backend endpoint that clears a conversation's server-side context.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Errors from the context reset endpoint.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("context reset request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("context reset rejected: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("context reset is not configured: {0}")]
    NotConfigured(&'static str),
}

#[derive(Debug, Serialize)]
struct ResetRequest<'a> {
    phone: &'a str,
    router: &'a str,
}

/// Asks the backend to forget everything about one conversation.
pub struct ContextResetClient {
    client: Client,
    endpoint: String,
    phone: String,
}

impl ContextResetClient {
    /// Creates a client for `endpoint`, resetting on behalf of `phone`.
    pub fn new(endpoint: impl Into<String>, phone: impl Into<String>) -> Result<Self, ResetError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            phone: phone.into(),
        })
    }

    /// Builds a client from configuration, if a reset endpoint is configured.
    pub fn from_config(config: &crate::ChatprobeConfig) -> Result<Self, ResetError> {
        let endpoint = config
            .context_reset
            .endpoint
            .as_deref()
            .ok_or(ResetError::NotConfigured("context_reset.endpoint"))?;
        let phone = config
            .reset_phone()
            .ok_or(ResetError::NotConfigured("context_reset.phone"))?;
        Self::new(endpoint, phone)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Clears context for the conversation routed through `router`.
    pub async fn reset(&self, router: &str) -> Result<(), ResetError> {
        info!(endpoint = %self.endpoint, router, "Resetting conversation context");

        let response = self
            .client
            .put(&self.endpoint)
            .json(&ResetRequest {
                phone: &self.phone,
                router,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ResetError::Rejected { status, body });
        }
        Ok(())
    }
}
