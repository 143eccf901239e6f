//! Usage snapshots and the context-window truncation policy.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ModelProfile, Turn};
use crate::tokenizer::Tokenizer;

/// Token usage derived from a turn list.
///
/// A snapshot is a pure function of (turns, profile, tokenizer) and is
/// rebuilt from scratch after every mutation of the turn list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Token count of each turn, aligned with the turn list
    pub per_turn_tokens: Vec<usize>,

    /// Whether each turn falls outside the context window
    pub truncated: Vec<bool>,

    /// Sum of `per_turn_tokens`
    pub total_tokens: usize,

    /// Sum of the counts of truncated turns
    pub truncated_tokens: usize,

    /// Context window the snapshot was computed against
    pub context_window_limit: usize,
}

impl UsageSnapshot {
    /// Empty snapshot for a session with no turns.
    pub fn empty(context_window_limit: usize) -> Self {
        Self {
            context_window_limit,
            ..Default::default()
        }
    }

    /// Apply the truncation policy to per-turn counts.
    ///
    /// A turn is truncated when the running total after including it exceeds
    /// the limit. Truncation only affects accounting and display; nothing is
    /// removed from the conversation.
    pub fn from_counts(per_turn_tokens: Vec<usize>, context_window_limit: usize) -> Self {
        let mut running = 0usize;
        let mut truncated_tokens = 0usize;
        let truncated = per_turn_tokens
            .iter()
            .map(|&tokens| {
                running += tokens;
                let over = running > context_window_limit;
                if over {
                    truncated_tokens += tokens;
                }
                over
            })
            .collect();

        Self {
            per_turn_tokens,
            truncated,
            total_tokens: running,
            truncated_tokens,
            context_window_limit,
        }
    }

    /// Number of turns covered.
    pub fn len(&self) -> usize {
        self.per_turn_tokens.len()
    }

    /// Whether no turns are covered.
    pub fn is_empty(&self) -> bool {
        self.per_turn_tokens.is_empty()
    }

    /// Token count of the turn at `index`.
    pub fn tokens_at(&self, index: usize) -> Option<usize> {
        self.per_turn_tokens.get(index).copied()
    }

    /// Whether the turn at `index` is outside the context window.
    pub fn is_truncated(&self, index: usize) -> bool {
        self.truncated.get(index).copied().unwrap_or(false)
    }

    /// Position of the first truncated turn, if any.
    pub fn first_truncated(&self) -> Option<usize> {
        self.truncated.iter().position(|&t| t)
    }

    /// Whether the conversation no longer fits the context window.
    pub fn context_exceeded(&self) -> bool {
        self.total_tokens > self.context_window_limit
    }

    /// Tokens that still fit inside the window.
    pub fn active_tokens(&self) -> usize {
        self.total_tokens - self.truncated_tokens
    }

    /// Fraction of the window in use, clamped to `0.0..=1.0`.
    pub fn usage_ratio(&self) -> f64 {
        if self.context_window_limit == 0 {
            return 1.0;
        }
        (self.total_tokens as f64 / self.context_window_limit as f64).min(1.0)
    }
}

/// Tokenize every turn and build a fresh snapshot for `profile`.
pub fn recompute_snapshot(
    turns: &[Turn],
    profile: &ModelProfile,
    tokenizer: &dyn Tokenizer,
) -> Result<UsageSnapshot> {
    let per_turn_tokens = turns
        .iter()
        .map(|turn| tokenizer.count_tokens(&turn.text, &profile.name))
        .collect::<Result<Vec<_>>>()?;

    Ok(UsageSnapshot::from_counts(
        per_turn_tokens,
        profile.context_window_limit,
    ))
}
