//! Token pricing and the usage snapshot derived from it.

use serde::{Deserialize, Serialize};

/// Token prices and the monetary ceiling they are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetPricing {
    /// Cost per 1M prompt tokens in dollars
    pub prompt_cost_per_million: f64,

    /// Cost per 1M completion tokens in dollars
    pub completion_cost_per_million: f64,

    /// Total project budget in dollars
    pub budget_dollars: f64,
}

impl Default for BudgetPricing {
    /// Prices as of June 2025 for the deployed model, against a $20 project budget.
    fn default() -> Self {
        Self {
            prompt_cost_per_million: 0.82,
            completion_cost_per_million: 3.27,
            budget_dollars: 20.0,
        }
    }
}

impl BudgetPricing {
    /// Dollar cost of the given token counts.
    ///
    /// # Formula
    /// `cost = (prompt * prompt_rate + completion * completion_rate) / 1_000_000`
    pub fn cost_dollars(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let prompt = (prompt_tokens as f64) * self.prompt_cost_per_million / 1_000_000.0;
        let completion =
            (completion_tokens as f64) * self.completion_cost_per_million / 1_000_000.0;
        prompt + completion
    }
}

/// Cumulative token usage over the trailing metrics window.
///
/// # Invariants
/// - Immutable once constructed
/// - `spent_fraction` always matches the counters under the pricing it was built with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    prompt_tokens: u64,
    completion_tokens: u64,
    spent_fraction: f64,
}

impl UsageSnapshot {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, pricing: &BudgetPricing) -> Self {
        let spent = pricing.cost_dollars(prompt_tokens, completion_tokens);
        Self {
            prompt_tokens,
            completion_tokens,
            spent_fraction: spent / pricing.budget_dollars,
        }
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.prompt_tokens
    }

    pub fn completion_tokens(&self) -> u64 {
        self.completion_tokens
    }

    /// Fraction of the budget spent so far (1.0 == fully spent).
    pub fn spent_fraction(&self) -> f64 {
        self.spent_fraction
    }

    /// Whether spending has gone past the ceiling.
    pub fn is_over_budget(&self) -> bool {
        self.spent_fraction > 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_uses_per_million_rates() {
        let pricing = BudgetPricing::default();
        let cost = pricing.cost_dollars(1_000_000, 1_000_000);
        assert!((cost - (0.82 + 3.27)).abs() < 1e-9);
    }

    #[test]
    fn test_spent_fraction_against_budget() {
        let pricing = BudgetPricing {
            prompt_cost_per_million: 1.0,
            completion_cost_per_million: 2.0,
            budget_dollars: 10.0,
        };
        // $2 of prompt + $4 of completion = $6 of $10
        let snapshot = UsageSnapshot::new(2_000_000, 2_000_000, &pricing);
        assert!((snapshot.spent_fraction() - 0.6).abs() < 1e-9);
        assert!(!snapshot.is_over_budget());
    }

    #[test]
    fn test_exactly_full_budget_is_not_over() {
        let pricing = BudgetPricing {
            prompt_cost_per_million: 1.0,
            completion_cost_per_million: 1.0,
            budget_dollars: 1.0,
        };
        let snapshot = UsageSnapshot::new(1_000_000, 0, &pricing);
        assert!((snapshot.spent_fraction() - 1.0).abs() < 1e-12);
        assert!(!snapshot.is_over_budget());

        let over = UsageSnapshot::new(1_000_001, 0, &pricing);
        assert!(over.is_over_budget());
    }

    #[test]
    fn test_zero_usage_is_zero_fraction() {
        let snapshot = UsageSnapshot::new(0, 0, &BudgetPricing::default());
        assert_eq!(snapshot.spent_fraction(), 0.0);
    }
}
