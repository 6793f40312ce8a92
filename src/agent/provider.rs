use super::types::{MessageRequest, MessageResponse};
use crate::error::{OpsError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2023-06-01";

/// One request/response exchange with the language model.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse>;
}

/// Anthropic Messages API over HTTPS.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| OpsError::ProviderRequestFailed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "sending request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| OpsError::ProviderRequestFailed(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OpsError::ProviderRequestFailed(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(OpsError::ProviderRequestFailed(format!("status {status}: {body}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| OpsError::ProviderRequestFailed(format!("malformed response: {e}")))
    }
}
