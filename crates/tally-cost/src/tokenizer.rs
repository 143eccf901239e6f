//! Token counting.
//!
//! [`Tokenizer`] is the seam between the session and whatever encoding the
//! completion API bills with. [`TiktokenTokenizer`] is the production
//! implementation backed by `tiktoken-rs`; [`WordTokenizer`] is a
//! deterministic stand-in for tests and offline previews.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::error::{Result, UsageError};

/// Model-specific text encoder.
pub trait Tokenizer: Send + Sync {
    /// Encode `text` with the encoding used by `model`.
    fn encode(&self, text: &str, model: &str) -> Result<Vec<u32>>;

    /// Number of tokens `text` occupies for `model`.
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        Ok(self.encode(text, model)?.len())
    }

    /// Get the tokenizer name for logging/debugging.
    fn name(&self) -> &str;
}

/// BPE tokenizer using the OpenAI encodings shipped with `tiktoken-rs`.
///
/// Encoders are built on first use per model and kept for the lifetime of
/// the tokenizer. Token counts themselves are never cached.
#[derive(Default)]
pub struct TiktokenTokenizer {
    encoders: Mutex<HashMap<String, Arc<CoreBPE>>>,
}

impl TiktokenTokenizer {
    /// Create a tokenizer with no encoders loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the encoder for `model` now instead of on the first count.
    pub fn preload(&self, model: &str) -> Result<()> {
        self.encoder(model).map(|_| ())
    }

    fn encoder(&self, model: &str) -> Result<Arc<CoreBPE>> {
        let mut encoders = self
            .encoders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(bpe) = encoders.get(model) {
            return Ok(Arc::clone(bpe));
        }

        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            UsageError::TokenizerUnavailable {
                model: model.to_string(),
                message: e.to_string(),
            }
        })?;
        debug!(model, "loaded tiktoken encoder");

        let bpe = Arc::new(bpe);
        encoders.insert(model.to_string(), Arc::clone(&bpe));
        Ok(bpe)
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str, model: &str) -> Result<Vec<u32>> {
        let bpe = self.encoder(model)?;
        Ok(bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|token| token as u32)
            .collect())
    }

    fn name(&self) -> &str {
        "tiktoken"
    }
}

/// Counts whitespace-separated words as tokens.
///
/// Token ids are word positions, so equal texts encode identically. Models
/// listed with [`WordTokenizer::with_unavailable`] fail like a model without
/// a tiktoken encoding would.
#[derive(Debug, Clone, Default)]
pub struct WordTokenizer {
    unavailable: Vec<String>,
}

impl WordTokenizer {
    /// Create a tokenizer that accepts every model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make encoding fail for `model`.
    pub fn with_unavailable(mut self, model: impl Into<String>) -> Self {
        self.unavailable.push(model.into());
        self
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str, model: &str) -> Result<Vec<u32>> {
        if self.unavailable.iter().any(|m| m == model) {
            return Err(UsageError::TokenizerUnavailable {
                model: model.to_string(),
                message: "no encoding registered".to_string(),
            });
        }
        Ok((0..text.split_whitespace().count() as u32).collect())
    }

    fn name(&self) -> &str {
        "words"
    }
}
