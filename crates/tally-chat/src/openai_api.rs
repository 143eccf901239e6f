//! OpenAI provider using direct HTTP requests.
//!
//! This module provides [`OpenAiProvider`] which calls an OpenAI-compatible
//! `chat/completions` endpoint using the reqwest HTTP client.
//!
//! ## Example
//!
//! ```no_run
//! use tally_chat::{config::OpenAiConfig, openai_api::OpenAiProvider};
//! use tally_chat::provider::{ChatProvider, CompletionRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = OpenAiProvider::with_api_key(OpenAiConfig::default(), "sk-...")?;
//! let response = provider
//!     .complete(&CompletionRequest::prompt("gpt-4", "Hello!"))
//!     .await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

use ::async_trait::async_trait;
use tally_core::TallyError;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::OpenAiConfig;
use crate::error::{ChatError, Result};
use crate::openai_api_types::{ApiErrorEnvelope, ApiRequest, ApiResponse};
use crate::provider::{
    ChatProvider, CompletionRequest, FinishReason, ProviderResponse, TokenUsage,
};

/// OpenAI provider using direct HTTP requests.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiProvider {
    /// Create a provider, reading the API key from `config.api_key_env`.
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TallyError::ConfigMissingField {
                field: format!("OpenAI API key ({})", config.api_key_env),
            })?;

        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit API key.
    pub fn with_api_key(config: OpenAiConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TallyError::ConfigMissingField {
                field: "OpenAI API key".to_string(),
            }
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = completions_endpoint(&config.api_base_url);

        Ok(Self {
            config,
            client,
            api_key,
            endpoint,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the API request and parse the response.
    async fn send_request(&self, request: &ApiRequest<'_>) -> Result<ApiResponse> {
        debug!(endpoint = %self.endpoint, model = request.model, "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::from_transport(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "completion request failed");
            return Err(ChatError::from_http_status(status.as_u16(), &message, retry_after));
        }

        response
            .json()
            .await
            .map_err(|e| ChatError::from_transport(e, self.config.timeout_secs))
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse> {
        let start = std::time::Instant::now();

        let api_request = ApiRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let api_response = self.send_request(&api_request).await?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?;
        let text = choice.message.content.ok_or(ChatError::EmptyResponse)?;

        let duration = start.elapsed().as_millis() as u64;
        debug!(
            id = api_response.id.as_deref().unwrap_or("-"),
            duration_ms = duration,
            "completion received"
        );

        let mut response = ProviderResponse::new(text)
            .with_duration(duration)
            .with_finish_reason(FinishReason::from_api(choice.finish_reason.as_deref()));
        if let Some(usage) = api_response.usage {
            response = response.with_usage(TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Resolve the chat-completions URL for a base URL.
///
/// A base that already ends in `/v1` is not given a second one.
pub fn completions_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        format!("{}/chat/completions", trimmed)
    } else {
        format!("{}/v1/chat/completions", trimmed)
    }
}

/// Pull `error.message` out of an error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
