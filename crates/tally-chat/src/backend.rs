//! Chat backend: one session, one provider, and the model table.

use std::sync::Arc;
use std::time::Instant;

use tally_core::log_cost_event;
use tally_cost::{
    ChatSession, ExchangeOutcome, ModelTable, Tokenizer, UsageSnapshot,
};
use tokio::time::{Duration, timeout};
use tracing::{error, info};

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::provider::{ChatProvider, CompletionRequest, ProviderResponse, create_provider};

/// Result of one successful prompt/response round trip.
#[derive(Debug, Clone)]
pub struct ExchangeReport {
    /// Token and cost accounting for the two new turns.
    pub outcome: ExchangeOutcome,

    /// What the provider returned.
    pub response: ProviderResponse,

    /// Provider that answered.
    pub provider: String,

    /// Wall time of the provider call in milliseconds.
    pub duration_ms: u64,
}

/// Chat backend with pluggable provider support.
///
/// The session is only mutated after the provider has answered, so a failed,
/// timed out or dropped [`submit`](Self::submit) leaves it untouched.
pub struct ChatBackend {
    config: ChatConfig,
    table: ModelTable,
    provider: Box<dyn ChatProvider>,
    session: ChatSession,
    timeout: Duration,
}

impl ChatBackend {
    /// Create a backend from configuration.
    ///
    /// `api_key` overrides the key read from the environment.
    pub fn new(
        config: ChatConfig,
        tokenizer: Arc<dyn Tokenizer>,
        api_key: Option<&str>,
    ) -> Result<Self> {
        let provider = create_provider(&config, api_key)?;
        Self::with_provider(config, tokenizer, provider)
    }

    /// Create a backend with a custom provider.
    pub fn with_provider(
        config: ChatConfig,
        tokenizer: Arc<dyn Tokenizer>,
        provider: Box<dyn ChatProvider>,
    ) -> Result<Self> {
        let table = config.model_table()?;
        let profile = table.get(&config.model)?.clone();
        let session = ChatSession::new(profile, tokenizer).with_cached_pricing(config.cached_pricing);
        let timeout = Duration::from_secs(config.timeout_secs);

        info!(
            model = %config.model,
            provider = provider.name(),
            send_history = config.send_history,
            "chat backend ready"
        );

        Ok(Self {
            config,
            table,
            provider,
            session,
            timeout,
        })
    }

    /// Get the provider being used.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Get the model being used.
    pub fn model(&self) -> &str {
        self.session.model()
    }

    /// Active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Known model profiles.
    pub fn table(&self) -> &ModelTable {
        &self.table
    }

    /// The conversation.
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// The conversation, for edits and deletes.
    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }

    /// Switch the session to another known model.
    pub fn switch_model(&mut self, model: &str) -> Result<&UsageSnapshot> {
        let profile = self.table.get(model)?.clone();
        let name = profile.name.clone();
        self.session.set_profile(profile)?;
        self.config.model = name;
        Ok(self.session.snapshot())
    }

    /// Build the provider request for `prompt`.
    pub fn build_request(&self, prompt: &str) -> CompletionRequest {
        if self.config.send_history {
            CompletionRequest::with_history(self.session.model(), self.session.turns(), prompt)
        } else {
            CompletionRequest::prompt(self.session.model(), prompt)
        }
    }

    /// Send `prompt` to the provider and record the exchange.
    ///
    /// The prompt is tokenized before any network traffic so a tokenizer
    /// failure never costs an API call. Dropping the returned future cancels
    /// the request with the session unchanged.
    pub async fn submit(&mut self, prompt: &str) -> Result<ExchangeReport> {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        self.session.count_tokens(prompt)?;

        let request = self.build_request(prompt);
        let provider_name = self.provider.name().to_string();
        info!(
            provider = %provider_name,
            model = %request.model,
            messages = request.messages.len(),
            "sending prompt"
        );

        let start = Instant::now();
        let response = match timeout(self.timeout, self.provider.complete(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(provider = %provider_name, error = %e, "completion failed");
                return Err(e);
            }
            Err(_) => {
                let secs = self.timeout.as_secs();
                error!(provider = %provider_name, timeout_secs = secs, "completion timed out");
                return Err(ChatError::Timeout(
                    secs,
                    "no response before the deadline".to_string(),
                ));
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = self.session.record_exchange(prompt, response.text.clone())?;

        log_cost_event!(
            model = %self.session.model(),
            input_tokens = outcome.prompt_tokens,
            output_tokens = outcome.response_tokens,
            cost_usd = outcome.cost.total_usd(),
            total_tokens = self.session.snapshot().total_tokens,
            context_exceeded = outcome.context_exceeded
        );

        Ok(ExchangeReport {
            outcome,
            response,
            provider: provider_name,
            duration_ms,
        })
    }
}
