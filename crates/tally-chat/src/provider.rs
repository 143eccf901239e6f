//! Pluggable completion provider trait and implementations.
//!
//! This module defines the [`ChatProvider`] trait which abstracts the
//! completion backend used by the chat loop.
//!
//! ## Implementations
//!
//! - [`OpenAiProvider`] - OpenAI-compatible chat completions over HTTP (see [`openai_api`](crate::openai_api))
//! - [`MockProvider`] - Testing mock that returns predefined responses
//!
//! ## Example
//!
//! ```no_run
//! use tally_chat::config::OpenAiConfig;
//! use tally_chat::openai_api::OpenAiProvider;
//! use tally_chat::provider::{ChatProvider, CompletionRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = OpenAiProvider::from_config(OpenAiConfig::default())?;
//! let request = CompletionRequest::prompt("gpt-3.5-turbo", "Hello!");
//! let response = provider.complete(&request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

use ::async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tally_cost::{Role, Turn};
use tokio::time::Duration;
use tracing::info;

use crate::config::{ChatConfig, MockConfig, ProviderConfig};
use crate::error::{ChatError, Result};
use crate::openai_api::OpenAiProvider;

/// One message sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Author of the message
    pub role: Role,

    /// Message text
    pub content: String,
}

impl PromptMessage {
    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&Turn> for PromptMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.text.clone(),
        }
    }
}

/// What to ask the provider for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model name as the provider knows it
    pub model: String,

    /// Conversation to complete, oldest first
    pub messages: Vec<PromptMessage>,
}

impl CompletionRequest {
    /// Request carrying the prompt alone.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![PromptMessage::user(prompt)],
        }
    }

    /// Request carrying every prior turn followed by the prompt.
    pub fn with_history(
        model: impl Into<String>,
        history: &[Turn],
        prompt: impl Into<String>,
    ) -> Self {
        let mut messages: Vec<PromptMessage> = history.iter().map(PromptMessage::from).collect();
        messages.push(PromptMessage::user(prompt));
        Self {
            model: model.into(),
            messages,
        }
    }

    /// Text of the final user message.
    pub fn last_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Response from a chat provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Response text from the model.
    pub text: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Reason why the response ended.
    pub finish_reason: FinishReason,

    /// Token usage reported by the provider (if available).
    ///
    /// Informational only. Session accounting always uses the local tokenizer.
    pub usage: Option<TokenUsage>,
}

impl ProviderResponse {
    /// Create a new basic response.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration_ms: 0,
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    /// Set the finish reason.
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Set the token usage.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Reason why the provider's response ended.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FinishReason {
    /// Normal stop sequence.
    #[default]
    Stop,
    /// Max tokens reached.
    MaxTokens,
    /// Output withheld by a content filter.
    ContentFilter,
    /// Anything else the provider reported.
    Other(String),
}

impl FinishReason {
    /// Map an OpenAI `finish_reason` string.
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            None | Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens billed.
    pub input_tokens: u32,

    /// Completion tokens billed.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens consumed (input + output).
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens as u64 + self.output_tokens as u64
    }
}

/// Trait for completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Complete the conversation in `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse>;

    /// Get the provider name for logging/debugging.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ChatProvider + ?Sized> ChatProvider for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse> {
        (**self).complete(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ============ Mock Provider ============

/// Mock provider for testing.
///
/// Returns predefined responses without making any external calls, and
/// remembers every request it was given.
pub struct MockProvider {
    response_text: String,
    response_delay_ms: u64,
    failure: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with default responses.
    pub fn new() -> Self {
        Self::from_config(MockConfig::default())
    }

    /// Create a mock provider from config.
    pub fn from_config(config: MockConfig) -> Self {
        Self {
            response_text: config.response,
            response_delay_ms: config.delay_ms,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the response text.
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response_text = text.into();
        self
    }

    /// Set the response delay.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    /// Fail every request with an API error.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ProviderResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }

        if let Some(message) = &self.failure {
            return Err(ChatError::ApiError(message.clone()));
        }

        Ok(ProviderResponse::new(self.response_text.clone()).with_duration(self.response_delay_ms))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============ Provider Factory ============

/// Create a provider from configuration.
///
/// `api_key` overrides the key normally read from the environment variable
/// named in the OpenAI provider config.
pub fn create_provider(config: &ChatConfig, api_key: Option<&str>) -> Result<Box<dyn ChatProvider>> {
    match &config.provider {
        ProviderConfig::OpenAi(api_config) => {
            info!(base_url = %api_config.api_base_url, "Creating openai provider");
            let provider = match api_key {
                Some(key) => OpenAiProvider::with_api_key(api_config.clone(), key)?,
                None => OpenAiProvider::from_config(api_config.clone())?,
            };
            Ok(Box::new(provider))
        }
        ProviderConfig::Mock(mock_config) => {
            info!("Creating mock provider");
            Ok(Box::new(MockProvider::from_config(mock_config.clone())))
        }
    }
}
