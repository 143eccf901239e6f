//! Chat session: the ordered turn list plus its usage snapshot.
//!
//! Every mutation (append, edit, delete, model switch) retokenizes the whole
//! conversation before it is committed. If the tokenizer fails, the turn
//! list and snapshot are left exactly as they were.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, UsageError};
use crate::models::{ModelProfile, Role, Turn, TurnId};
use crate::pricing::{CachedPricing, CostBreakdown};
use crate::tokenizer::Tokenizer;
use crate::usage::{UsageSnapshot, recompute_snapshot};

/// Result of appending a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOutcome {
    /// Id assigned to the new turn
    pub id: TurnId,

    /// Token count of the new turn
    pub tokens: usize,

    /// Whether the conversation now exceeds the context window
    pub context_exceeded: bool,
}

/// Result of recording a prompt/response pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    /// Id of the user turn
    pub user_id: TurnId,

    /// Id of the assistant turn
    pub assistant_id: TurnId,

    /// Tokens in the prompt
    pub prompt_tokens: usize,

    /// Tokens in the response
    pub response_tokens: usize,

    /// Cost of this exchange
    pub cost: CostBreakdown,

    /// Whether the conversation now exceeds the context window
    pub context_exceeded: bool,
}

/// One conversation with its token accounting.
pub struct ChatSession {
    profile: ModelProfile,
    tokenizer: Arc<dyn Tokenizer>,
    cached_pricing: CachedPricing,
    turns: Vec<Turn>,
    snapshot: UsageSnapshot,
    next_id: u64,
    spent_usd: f64,
}

impl ChatSession {
    /// Create an empty session for `profile`.
    pub fn new(profile: ModelProfile, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let snapshot = UsageSnapshot::empty(profile.context_window_limit);
        Self {
            profile,
            tokenizer,
            cached_pricing: CachedPricing::default(),
            turns: Vec::new(),
            snapshot,
            next_id: 1,
            spent_usd: 0.0,
        }
    }

    /// Set how cached-input prices are charged.
    pub fn with_cached_pricing(mut self, mode: CachedPricing) -> Self {
        self.cached_pricing = mode;
        self
    }

    /// Active model profile.
    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Active model name.
    pub fn model(&self) -> &str {
        &self.profile.name
    }

    /// Cached-input pricing mode.
    pub fn cached_pricing(&self) -> CachedPricing {
        self.cached_pricing
    }

    /// Turns in conversation order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Current usage snapshot.
    pub fn snapshot(&self) -> &UsageSnapshot {
        &self.snapshot
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the session has no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Total cost of every exchange recorded so far.
    pub fn spent_usd(&self) -> f64 {
        self.spent_usd
    }

    /// Current position of the turn with `id`.
    pub fn index_of(&self, id: TurnId) -> Option<usize> {
        self.turns.iter().position(|t| t.id == id)
    }

    /// Turn with `id`.
    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    /// Count tokens for the active model.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        self.tokenizer.count_tokens(text, &self.profile.name)
    }

    /// Price an exchange with the active profile and pricing mode.
    pub fn calculate_cost(&self, input_tokens: usize, output_tokens: usize) -> CostBreakdown {
        CostBreakdown::compute(input_tokens, output_tokens, &self.profile, self.cached_pricing)
    }

    /// Append a turn and recompute usage.
    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) -> Result<AppendOutcome> {
        let id = self.allocate_id();
        self.turns.push(Turn::new(id, role, text));

        if let Err(e) = self.refresh() {
            self.turns.pop();
            return Err(e);
        }

        let tokens = self.snapshot.tokens_at(self.turns.len() - 1).unwrap_or(0);
        let context_exceeded = self.snapshot.context_exceeded();
        if context_exceeded {
            info!(
                model = %self.profile.name,
                total = self.snapshot.total_tokens,
                limit = self.snapshot.context_window_limit,
                "context window exceeded"
            );
        }

        Ok(AppendOutcome {
            id,
            tokens,
            context_exceeded,
        })
    }

    /// Append a user prompt and the assistant's response as one step.
    ///
    /// Both turns are committed together or not at all. The cost is charged
    /// for the prompt as input and the response as output.
    pub fn record_exchange(
        &mut self,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Result<ExchangeOutcome> {
        let user_id = self.allocate_id();
        let assistant_id = self.allocate_id();
        self.turns.push(Turn::new(user_id, Role::User, prompt));
        self.turns.push(Turn::new(assistant_id, Role::Assistant, response));

        if let Err(e) = self.refresh() {
            self.turns.truncate(self.turns.len() - 2);
            return Err(e);
        }

        let len = self.turns.len();
        let prompt_tokens = self.snapshot.tokens_at(len - 2).unwrap_or(0);
        let response_tokens = self.snapshot.tokens_at(len - 1).unwrap_or(0);
        let cost = self.calculate_cost(prompt_tokens, response_tokens);
        self.spent_usd += cost.total_usd();

        Ok(ExchangeOutcome {
            user_id,
            assistant_id,
            prompt_tokens,
            response_tokens,
            cost,
            context_exceeded: self.snapshot.context_exceeded(),
        })
    }

    /// Replace the text of the turn at `index`.
    pub fn edit_turn(&mut self, index: usize, new_text: impl Into<String>) -> Result<&UsageSnapshot> {
        self.check_index(index)?;

        let previous = std::mem::replace(&mut self.turns[index].text, new_text.into());
        if let Err(e) = self.refresh() {
            self.turns[index].text = previous;
            return Err(e);
        }
        self.turns[index].edited_at = Some(Utc::now());
        debug!(index, id = %self.turns[index].id, "turn edited");

        Ok(&self.snapshot)
    }

    /// Remove the turn at `index`. Later turns shift down by one position.
    pub fn delete_turn(&mut self, index: usize) -> Result<&UsageSnapshot> {
        self.check_index(index)?;

        let removed = self.turns.remove(index);
        if let Err(e) = self.refresh() {
            self.turns.insert(index, removed);
            return Err(e);
        }
        debug!(index, id = %removed.id, "turn deleted");

        Ok(&self.snapshot)
    }

    /// Replace the text of the turn with `id`.
    pub fn edit_turn_by_id(&mut self, id: TurnId, new_text: impl Into<String>) -> Result<&UsageSnapshot> {
        let index = self.index_of(id).ok_or(UsageError::TurnNotFound(id))?;
        self.edit_turn(index, new_text)
    }

    /// Remove the turn with `id`.
    pub fn delete_turn_by_id(&mut self, id: TurnId) -> Result<&UsageSnapshot> {
        let index = self.index_of(id).ok_or(UsageError::TurnNotFound(id))?;
        self.delete_turn(index)
    }

    /// Switch to another model and recompute usage against it.
    pub fn set_profile(&mut self, profile: ModelProfile) -> Result<&UsageSnapshot> {
        let snapshot = recompute_snapshot(&self.turns, &profile, self.tokenizer.as_ref())?;
        info!(from = %self.profile.name, to = %profile.name, "model switched");
        self.profile = profile;
        self.snapshot = snapshot;
        Ok(&self.snapshot)
    }

    /// Drop every turn. Ids keep increasing and money spent is kept.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.snapshot = UsageSnapshot::empty(self.profile.context_window_limit);
    }

    fn allocate_id(&mut self) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        id
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.turns.len() {
            return Err(UsageError::IndexOutOfRange {
                index,
                len: self.turns.len(),
            });
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.snapshot = recompute_snapshot(&self.turns, &self.profile, self.tokenizer.as_ref())?;
        Ok(())
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("model", &self.profile.name)
            .field("tokenizer", &self.tokenizer.name())
            .field("turns", &self.turns.len())
            .field("total_tokens", &self.snapshot.total_tokens)
            .field("spent_usd", &self.spent_usd)
            .finish()
    }
}
