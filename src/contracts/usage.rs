//! Per-call usage accounting.

use serde::{Deserialize, Serialize};

use super::CostTier;

/// Accounting record attached to every routed result.
///
/// Used for logging and for the cache's cost-saved accounting; this layer
/// does not reconcile billing beyond producing these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiUsage {
    /// Provider that served the call, empty when no provider was contacted.
    pub provider: String,
    /// Model name reported by the adapter, empty when unknown.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Computed cost in USD. Zero for cache hits and failed calls.
    pub cost_usd: f64,
    /// Wall-clock duration of the routed call in milliseconds.
    pub duration_ms: u64,
    /// Whether the value was served from the response cache.
    pub cached: bool,
    /// The cost tier the call was routed under.
    pub tier: CostTier,
}

impl AiUsage {
    /// Usage for a call that never reached a provider.
    pub fn none(tier: CostTier) -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            duration_ms: 0,
            cached: false,
            tier,
        }
    }

    /// Compute cost from token counts and per-1k-token rates.
    pub fn cost_for(input_tokens: u64, output_tokens: u64, input_per_1k: f64, output_per_1k: f64) -> f64 {
        (input_tokens as f64 / 1000.0) * input_per_1k
            + (output_tokens as f64 / 1000.0) * output_per_1k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_computation() {
        // 2000 input at $0.50/1k + 500 output at $1.00/1k
        let cost = AiUsage::cost_for(2000, 500, 0.5, 1.0);
        assert!((cost - 1.5).abs() < 1e-9);
        assert_eq!(AiUsage::cost_for(0, 0, 0.5, 1.0), 0.0);
    }
}
