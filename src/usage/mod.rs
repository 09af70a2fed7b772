//! Token usage metrics - the live input to the budget gate.
//!
//! The service never keeps its own usage counters; it asks the hosting
//! resource's metrics API for cumulative prompt and completion tokens over a
//! trailing window on every request.

mod azure_monitor;

pub use azure_monitor::AzureMonitorUsage;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Cumulative token counters over the metrics window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Metrics request failed: {0}")]
    Request(String),

    #[error("Metrics API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse metrics response: {0}")]
    Parse(String),

    #[error("Metric {0} missing from response")]
    MissingMetric(String),

    #[error("Metrics query did not answer within {0:?}")]
    Timeout(Duration),
}

/// Source of cumulative token usage.
#[async_trait]
pub trait UsageMetrics: Send + Sync {
    /// Return prompt and completion token totals over the trailing window.
    async fn lifetime_usage(&self) -> Result<TokenTotals, UsageError>;
}
