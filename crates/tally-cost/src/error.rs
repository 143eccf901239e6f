//! Error types for usage tracking.

use thiserror::Error;

use crate::models::TurnId;

/// Usage tracking errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    /// Positional edit/delete outside `0..len`
    #[error("turn index {index} out of range (session has {len} turns)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of turns at the time of the request
        len: usize,
    },

    /// Stable-id edit/delete for a turn that no longer exists
    #[error("turn {0} not found")]
    TurnNotFound(TurnId),

    /// No tokenizer encoding is known for the model
    #[error("tokenizer unavailable for model {model}: {message}")]
    TokenizerUnavailable {
        /// Model name passed to the tokenizer
        model: String,
        /// Underlying tokenizer error
        message: String,
    },

    /// Model is not in the profile table
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Model profile failed validation
    #[error("invalid model profile {model}: {message}")]
    InvalidProfile {
        /// Model name of the offending profile
        model: String,
        /// What is wrong with it
        message: String,
    },
}

impl UsageError {
    /// Whether the session cannot continue with its current model.
    ///
    /// A tokenizer failure makes every count for the model meaningless, so
    /// the user has to pick another model.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, UsageError::TokenizerUnavailable { .. })
    }

    /// Create a user-friendly message for this error.
    pub fn friendly_message(&self) -> String {
        match self {
            UsageError::IndexOutOfRange { index, len } => {
                if *len == 0 {
                    "There are no messages yet.".to_string()
                } else {
                    format!(
                        "Message {} does not exist (valid positions: 0..{}).",
                        index, len
                    )
                }
            }
            UsageError::TurnNotFound(id) => {
                format!("Message {} no longer exists. It may have been deleted.", id)
            }
            UsageError::TokenizerUnavailable { model, .. } => {
                format!(
                    "No tokenizer is available for {}. Choose a different model.",
                    model
                )
            }
            UsageError::UnknownModel(model) => {
                format!("Model {} has no pricing profile.", model)
            }
            _ => format!("Error: {}", self),
        }
    }
}

/// Result type for usage tracking operations.
pub type Result<T> = std::result::Result<T, UsageError>;
