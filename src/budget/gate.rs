//! Pre-flight spending check.

use std::sync::Arc;

use super::pricing::{BudgetPricing, UsageSnapshot};
use crate::orchestrator::AgentError;
use crate::usage::UsageMetrics;

/// Converts live token counters into a pass/fail decision.
///
/// Holds no usage state of its own; every check re-queries the metrics source.
#[derive(Clone)]
pub struct BudgetGate {
    usage: Arc<dyn UsageMetrics>,
    pricing: BudgetPricing,
}

impl BudgetGate {
    pub fn new(usage: Arc<dyn UsageMetrics>, pricing: BudgetPricing) -> Self {
        Self { usage, pricing }
    }

    pub fn pricing(&self) -> &BudgetPricing {
        &self.pricing
    }

    /// Read current usage without enforcing the ceiling.
    pub async fn snapshot(&self) -> Result<UsageSnapshot, AgentError> {
        let totals = self.usage.lifetime_usage().await.map_err(|e| {
            tracing::error!("Usage metrics unavailable: {}", e);
            AgentError::UsageUnavailable(e)
        })?;
        Ok(UsageSnapshot::new(
            totals.prompt_tokens,
            totals.completion_tokens,
            &self.pricing,
        ))
    }

    /// Read current usage and fail if spending is past the ceiling.
    ///
    /// # Errors
    /// - `AgentError::UsageUnavailable` if the metrics source fails
    /// - `AgentError::BudgetExceeded` if `spent_fraction > 1.0`
    pub async fn check(&self) -> Result<UsageSnapshot, AgentError> {
        let snapshot = self.snapshot().await?;
        if snapshot.is_over_budget() {
            tracing::warn!(
                spent_fraction = snapshot.spent_fraction(),
                prompt_tokens = snapshot.prompt_tokens(),
                completion_tokens = snapshot.completion_tokens(),
                "Project budget exceeded, refusing request"
            );
            return Err(AgentError::BudgetExceeded {
                spent_fraction: snapshot.spent_fraction(),
            });
        }
        tracing::debug!(
            spent_fraction = snapshot.spent_fraction(),
            "Budget check passed"
        );
        Ok(snapshot)
    }
}
