//! Cost calculation from the static price table.
//!
//! The default [`CachedPricing::Additive`] mode charges the cached-input
//! price on top of the regular input price whenever a model defines one.
//! This overstates cost for those models; [`CachedPricing::Excluded`] drops
//! the extra term and has to be opted into through configuration.

use serde::{Deserialize, Serialize};

use crate::models::ModelProfile;

/// How the cached-input price participates in a cost figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedPricing {
    /// Add `input_tokens * cached_price` to the regular input cost.
    #[default]
    Additive,
    /// Ignore the cached-input price.
    Excluded,
}

/// Cost of one exchange split by component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Prompt tokens at the input price
    pub input_cost_usd: f64,

    /// Completion tokens at the output price
    pub output_cost_usd: f64,

    /// Prompt tokens at the cached-input price (zero when excluded or absent)
    pub cached_cost_usd: f64,
}

impl CostBreakdown {
    /// Price an exchange.
    pub fn compute(
        input_tokens: usize,
        output_tokens: usize,
        profile: &ModelProfile,
        mode: CachedPricing,
    ) -> Self {
        let input_k = input_tokens as f64 / 1000.0;
        let output_k = output_tokens as f64 / 1000.0;

        let cached_cost_usd = match (mode, profile.cached_input_price_per_1k) {
            (CachedPricing::Additive, Some(price)) => input_k * price,
            _ => 0.0,
        };

        Self {
            input_cost_usd: input_k * profile.input_price_per_1k,
            output_cost_usd: output_k * profile.output_price_per_1k,
            cached_cost_usd,
        }
    }

    /// Sum of all components.
    pub fn total_usd(&self) -> f64 {
        self.input_cost_usd + self.output_cost_usd + self.cached_cost_usd
    }
}

/// Cost of an exchange with the default additive cached pricing.
pub fn calculate_cost(input_tokens: usize, output_tokens: usize, profile: &ModelProfile) -> f64 {
    CostBreakdown::compute(input_tokens, output_tokens, profile, CachedPricing::Additive).total_usd()
}

/// Format a USD amount the way the REPL shows it, e.g. `$0.0600`.
pub fn format_usd(cost: f64) -> String {
    format!("${:.4}", cost)
}
