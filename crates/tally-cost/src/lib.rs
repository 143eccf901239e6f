//! # tally-cost
//!
//! Token accounting for tally chat sessions.
//!
//! This crate provides:
//! - [`ChatSession`] - Ordered turn list with edit/delete and automatic recomputation
//! - [`UsageSnapshot`] - Per-turn token counts and context-window truncation
//! - [`ModelTable`] - Static per-model price and context-limit table
//! - [`Tokenizer`] - Model-specific token counting ([`TiktokenTokenizer`] in production)
//! - [`CostBreakdown`] - Cost of an exchange from the price table
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_cost::{ChatSession, ModelTable, Role, TiktokenTokenizer};
//!
//! fn main() -> tally_cost::Result<()> {
//!     let table = ModelTable::builtin();
//!     let profile = table.get("gpt-4")?.clone();
//!     let mut session = ChatSession::new(profile, Arc::new(TiktokenTokenizer::new()));
//!
//!     let outcome = session.record_exchange("What is Rust?", "A systems language.")?;
//!     println!("cost: ${:.4}", outcome.cost.total_usd());
//!
//!     session.edit_turn(0, "What is Rust, briefly?")?;
//!     println!("total tokens: {}", session.snapshot().total_tokens);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod pricing;
pub mod session;
pub mod tokenizer;
pub mod usage;

// Re-export main types
pub use error::{Result, UsageError};
pub use models::{ModelProfile, ModelTable, Role, Turn, TurnId};
pub use pricing::{CachedPricing, CostBreakdown, calculate_cost, format_usd};
pub use session::{AppendOutcome, ChatSession, ExchangeOutcome};
pub use tokenizer::{TiktokenTokenizer, Tokenizer, WordTokenizer};
pub use usage::{UsageSnapshot, recompute_snapshot};
