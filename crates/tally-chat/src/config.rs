//! Configuration for the chat backend.
//!
//! Loaded from `~/.tally/config.yaml` when present. Every field is optional;
//! a missing default file yields [`ChatConfig::default`].
//!
//! ```yaml
//! model: gpt-4
//! cached_pricing: additive   # or: excluded
//! send_history: false
//! timeout_secs: 60
//! provider:
//!   type: openai
//!   api_base_url: https://api.openai.com
//!   api_key_env: OPENAI_API_KEY
//! models:
//!   - name: gpt-4o-mini
//!     input_price_per_1k: 0.00015
//!     output_price_per_1k: 0.0006
//!     context_window_limit: 128000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_core::TallyError;
use tally_cost::{CachedPricing, ModelProfile, ModelTable};
use tracing::{debug, info};

use crate::error::{ChatError, Result};

/// Environment variable that overrides the configured model.
pub const MODEL_ENV: &str = "TALLY_MODEL";

/// Chat backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model to chat with (must exist in the profile table)
    pub model: String,

    /// How cached-input prices are charged
    pub cached_pricing: CachedPricing,

    /// Send the whole conversation with each prompt instead of the prompt alone
    pub send_history: bool,

    /// Deadline for one completion round trip, in seconds
    pub timeout_secs: u64,

    /// Extra or replacement model profiles
    pub models: Vec<ModelProfile>,

    /// Completion provider
    pub provider: ProviderConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            cached_pricing: CachedPricing::default(),
            send_history: false,
            timeout_secs: 60,
            models: Vec::new(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Provider selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// OpenAI-compatible chat completions over HTTP
    #[serde(rename = "openai")]
    OpenAi(OpenAiConfig),
    /// Canned responses, no network
    Mock(MockConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::OpenAi(OpenAiConfig::default())
    }
}

/// OpenAI-compatible API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL, with or without a trailing `/v1`
    pub api_base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// HTTP client timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature, provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Response length cap, provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Mock provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Text returned for every prompt
    pub response: String,

    /// Artificial latency in milliseconds
    pub delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            response: "This is a mock response.".to_string(),
            delay_ms: 0,
        }
    }
}

impl ChatConfig {
    /// Default config file location, `~/.tally/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(tally_core::logging::tally_dir()?.join("config.yaml"))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(TallyError::config_not_found(path).into());
                }
                Self::from_yaml_file(path)?
            }
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::from_yaml_file(&default_path)?
                } else {
                    debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };

        let config = config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TallyError::io("reading config", path, e))?;
        let config = Self::from_yaml_str(&content).map_err(|e| match e {
            ChatError::YamlError(e) => ChatError::CoreError(TallyError::ConfigInvalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            other => other,
        })?;
        info!(path = %path.display(), model = %config.model, "loaded config");
        Ok(config)
    }

    /// Parse YAML config text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty file deserializes to unit, not to a map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply environment overrides.
    pub fn apply_env(mut self) -> Self {
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                debug!(model = %model, "model overridden from {}", MODEL_ENV);
                self.model = model;
            }
        }
        self
    }

    /// Built-in profiles merged with the configured ones.
    pub fn model_table(&self) -> Result<ModelTable> {
        let mut table = ModelTable::builtin();
        table.merge(self.models.clone())?;
        Ok(table)
    }

    /// Check the configured model exists and timeouts are usable.
    pub fn validate(&self) -> Result<()> {
        let table = self.model_table()?;
        table.get(&self.model)?;

        if self.timeout_secs == 0 {
            return Err(TallyError::ConfigValidation {
                message: "timeout_secs must be greater than zero".into(),
            }
            .into());
        }
        if let ProviderConfig::OpenAi(api) = &self.provider {
            if api.timeout_secs == 0 {
                return Err(TallyError::ConfigValidation {
                    message: "provider.timeout_secs must be greater than zero".into(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Use another model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use another provider.
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Use the mock provider with a fixed response.
    pub fn with_mock_response(self, response: impl Into<String>) -> Self {
        self.with_provider(ProviderConfig::Mock(MockConfig {
            response: response.into(),
            delay_ms: 0,
        }))
    }

    /// Set the cached-input pricing mode.
    pub fn with_cached_pricing(mut self, mode: CachedPricing) -> Self {
        self.cached_pricing = mode;
        self
    }

    /// Send full history with each prompt.
    pub fn with_send_history(mut self, enabled: bool) -> Self {
        self.send_history = enabled;
        self
    }

    /// Set the completion deadline.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
