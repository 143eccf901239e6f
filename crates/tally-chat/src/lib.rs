//! # tally-chat
//!
//! Completion providers and exchange orchestration for tally.
//!
//! This crate provides:
//! - [`ChatBackend`] - Sends prompts and records each exchange in a [`tally_cost::ChatSession`]
//! - [`ChatProvider`] - Trait for completion backends
//! - [`OpenAiProvider`] - OpenAI-compatible chat completions over HTTP
//! - [`MockProvider`] - Offline provider for tests and demos
//! - [`ChatConfig`] - YAML configuration loaded from `~/.tally/config.yaml`
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_chat::{ChatBackend, ChatConfig};
//! use tally_cost::TiktokenTokenizer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ChatConfig::load(None)?;
//!     let mut backend = ChatBackend::new(config, Arc::new(TiktokenTokenizer::new()), None)?;
//!
//!     let report = backend.submit("What is a context window?").await?;
//!     println!("{}", report.response.text);
//!     println!("cost: ${:.4}", report.outcome.cost.total_usd());
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod openai_api;
pub mod openai_api_types;
pub mod provider;

// Re-export main types
pub use backend::{ChatBackend, ExchangeReport};
pub use config::{ChatConfig, MockConfig, OpenAiConfig, ProviderConfig};
pub use error::{ChatError, Result};
pub use openai_api::OpenAiProvider;
pub use provider::{
    ChatProvider, CompletionRequest, FinishReason, MockProvider, PromptMessage, ProviderResponse,
    TokenUsage, create_provider,
};
