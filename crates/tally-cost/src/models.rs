//! Data models for usage tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, UsageError};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Prompt typed by the user
    User,
    /// Completion returned by the model
    Assistant,
}

impl Role {
    /// Wire name used by chat-completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a turn, assigned at append time.
///
/// Ids are never reused within a session, so an id held by a stale view
/// either resolves to the same turn or to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Stable identifier
    pub id: TurnId,

    /// Author of the message
    pub role: Role,

    /// Message text
    pub text: String,

    /// When the turn was appended
    pub created_at: DateTime<Utc>,

    /// When the text was last replaced through an edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a new turn stamped with the current time.
    pub fn new(id: TurnId, role: Role, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    /// Whether the text was changed after creation.
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }
}

/// Pricing and context limits for one model.
///
/// Prices are USD per 1,000 tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model identifier (e.g., "gpt-4")
    pub name: String,

    /// Price of 1k prompt tokens
    pub input_price_per_1k: f64,

    /// Price of 1k completion tokens
    pub output_price_per_1k: f64,

    /// Price of 1k cached prompt tokens, for models that publish one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_price_per_1k: Option<f64>,

    /// Maximum tokens across the whole conversation
    pub context_window_limit: usize,
}

impl ModelProfile {
    /// Create a profile without a cached-input price.
    pub fn new(
        name: impl Into<String>,
        input_price_per_1k: f64,
        output_price_per_1k: f64,
        context_window_limit: usize,
    ) -> Self {
        Self {
            name: name.into(),
            input_price_per_1k,
            output_price_per_1k,
            cached_input_price_per_1k: None,
            context_window_limit,
        }
    }

    /// Set the cached-input price.
    pub fn with_cached_input(mut self, price_per_1k: f64) -> Self {
        self.cached_input_price_per_1k = Some(price_per_1k);
        self
    }

    /// Check prices are finite and non-negative and the limit is positive.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| UsageError::InvalidProfile {
            model: self.name.clone(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("model name is empty"));
        }
        let prices = [
            Some(self.input_price_per_1k),
            Some(self.output_price_per_1k),
            self.cached_input_price_per_1k,
        ];
        if prices
            .iter()
            .flatten()
            .any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(invalid("prices must be finite and non-negative"));
        }
        if self.context_window_limit == 0 {
            return Err(invalid("context_window_limit must be greater than zero"));
        }
        Ok(())
    }
}

/// Ordered table of model profiles keyed by name.
///
/// The first entry is the default model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTable {
    profiles: Vec<ModelProfile>,
}

impl ModelTable {
    /// Built-in OpenAI price list.
    ///
    /// Must be kept in sync with the provider's published pricing by hand.
    pub fn builtin() -> Self {
        let profiles = vec![
            ModelProfile::new("gpt-3.5-turbo", 0.0015, 0.0015, 4096),
            ModelProfile::new("gpt-3.5-turbo-16k", 0.003, 0.004, 16384),
            ModelProfile::new("gpt-4", 0.03, 0.06, 8192),
            ModelProfile::new("gpt-4-32k", 0.06, 0.12, 32768),
            ModelProfile::new("o1-preview", 0.015, 0.06, 128_000).with_cached_input(0.0075),
            ModelProfile::new("o1-preview-2024-09-12", 0.015, 0.06, 128_000)
                .with_cached_input(0.0075),
            ModelProfile::new("o1-mini", 0.003, 0.012, 128_000).with_cached_input(0.0015),
            ModelProfile::new("o1-mini-2024-09-12", 0.003, 0.012, 128_000)
                .with_cached_input(0.0015),
            ModelProfile::new("davinci-002", 0.012, 0.012, 4096),
            ModelProfile::new("babbage-002", 0.0004, 0.0004, 4096),
        ];
        Self { profiles }
    }

    /// Replace profiles with matching names and append new ones.
    pub fn merge(&mut self, overrides: Vec<ModelProfile>) -> Result<()> {
        for profile in overrides {
            profile.validate()?;
            match self.profiles.iter_mut().find(|p| p.name == profile.name) {
                Some(existing) => {
                    tracing::debug!(model = %profile.name, "overriding built-in model profile");
                    *existing = profile;
                }
                None => self.profiles.push(profile),
            }
        }
        Ok(())
    }

    /// Look up a profile by model name.
    pub fn get(&self, model: &str) -> Result<&ModelProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == model)
            .ok_or_else(|| UsageError::UnknownModel(model.to_string()))
    }

    /// Model names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// All profiles in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelProfile> {
        self.profiles.iter()
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the table has no profiles.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ModelTable {
    fn default() -> Self {
        Self::builtin()
    }
}
