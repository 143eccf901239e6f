//! Error types for the chat backend.

use tally_core::TallyError;
use tally_cost::UsageError;
use thiserror::Error;

/// Chat backend errors.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Provider returned 429
    #[error("API rate limit exceeded{}", retry_hint(.retry_after_secs))]
    ApiRateLimited {
        /// Seconds from the `retry-after` header, if sent
        retry_after_secs: Option<u64>,
    },

    /// API request failed (server-side, may succeed if sent again)
    #[error("API request failed (transient): {0}")]
    ApiTransientError(String),

    /// API request failed (permanent)
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Provider answered without any text
    #[error("API returned an empty response")]
    EmptyResponse,

    /// Network timeout
    #[error("Network timeout after {0}s: {1}")]
    Timeout(u64, String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// User cancelled the request while waiting
    #[error("Request cancelled")]
    Cancelled,

    /// Prompt is empty or whitespace
    #[error("Prompt is empty")]
    EmptyPrompt,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Token accounting error
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Core error
    #[error("Core error: {0}")]
    CoreError(#[from] TallyError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {}s", secs),
        None => String::new(),
    }
}

impl ChatError {
    /// Check if sending the same prompt again may succeed.
    ///
    /// Nothing is retried automatically; the REPL offers `/retry` instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::ApiTransientError(_)
                | ChatError::Timeout(_, _)
                | ChatError::ConnectionFailed(_)
                | ChatError::ApiRateLimited { .. }
        )
    }

    /// Whether the session has to stop using its current model.
    pub fn is_fatal_for_session(&self) -> bool {
        match self {
            ChatError::Usage(e) => e.is_fatal_for_session(),
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn friendly_message(&self) -> String {
        match self {
            ChatError::ApiRateLimited {
                retry_after_secs: Some(secs),
            } => format!("Rate limited by the API. Please wait {} seconds.", secs),
            ChatError::ApiRateLimited { .. } => {
                "Rate limited by the API. Please wait a moment.".to_string()
            }
            ChatError::ApiTransientError(msg) => {
                format!("Temporary API issue: {}. Please try again.", msg)
            }
            ChatError::Timeout(secs, _) => {
                format!("Request timed out after {}s. Check your connection.", secs)
            }
            ChatError::ConnectionFailed(msg) => {
                format!("Connection failed: {}. Check your network.", msg)
            }
            ChatError::Cancelled => "Request cancelled. Nothing was added to the chat.".to_string(),
            ChatError::ApiError(msg) => msg.clone(),
            ChatError::ConfigError(msg) => format!("Configuration error: {}", msg),
            ChatError::Usage(e) => e.friendly_message(),
            _ => format!("Error: {}", self),
        }
    }

    /// Get suggested action for this error.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            ChatError::ApiRateLimited { .. } => "Wait a moment before sending another message.",
            ChatError::ApiTransientError(_) => "Try again in a few seconds.",
            ChatError::Timeout(_, _) => "Check your internet connection and try again.",
            ChatError::ConnectionFailed(_) => "Verify network connectivity and API availability.",
            ChatError::ConfigError(_) => "Check your configuration file at ~/.tally/config.yaml.",
            ChatError::CoreError(e) => e.guidance().unwrap_or("Check your configuration."),
            ChatError::ApiError(msg) if msg.contains("401") || msg.contains("uthentication") => {
                "Check your API key configuration."
            }
            ChatError::Usage(UsageError::TokenizerUnavailable { .. }) => {
                "Switch to another model with /model."
            }
            ChatError::Usage(_) => "Use /history to see the current message numbers.",
            ChatError::HttpError(e) if e.is_timeout() => "Request timed out. Try again.",
            ChatError::HttpError(e) if e.is_connect() => "Could not connect. Check your network.",
            _ => "Try again or check the logs for details.",
        }
    }

    /// Classify an HTTP status code into appropriate error type.
    pub fn from_http_status(status: u16, body: &str, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => ChatError::ApiRateLimited { retry_after_secs },
            408 => ChatError::Timeout(0, "Request timeout".to_string()),
            500 | 502 | 503 | 504 => {
                ChatError::ApiTransientError(format!("Server error ({}): {}", status, body))
            }
            401 | 403 => ChatError::ApiError(format!("Authentication error ({}): {}", status, body)),
            _ => ChatError::ApiError(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ChatError::Timeout(timeout_secs, err.to_string())
        } else if err.is_connect() {
            ChatError::ConnectionFailed(err.to_string())
        } else {
            ChatError::HttpError(err)
        }
    }
}

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
