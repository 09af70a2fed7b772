//! Azure Monitor metrics client for deployed model token counters.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{TokenTotals, UsageError, UsageMetrics};
use crate::config::UsageConfig;

const MANAGEMENT_URL: &str = "https://management.azure.com";
const METRICS_API_VERSION: &str = "2023-10-01";
const PROMPT_METRIC: &str = "ProcessedPromptTokens";
const COMPLETION_METRIC: &str = "GeneratedTokens";

/// Queries the `Total` aggregation of the prompt/completion token metrics with
/// daily granularity and sums every bucket in the window.
pub struct AzureMonitorUsage {
    client: Client,
    base_url: String,
    resource_id: String,
    token: String,
    window_days: i64,
}

impl AzureMonitorUsage {
    pub fn new(config: &UsageConfig) -> Self {
        Self::with_base_url(MANAGEMENT_URL, config)
    }

    pub fn with_base_url(base_url: impl Into<String>, config: &UsageConfig) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            resource_id: config.resource_id.trim_matches('/').to_string(),
            token: config.token.clone(),
            window_days: config.window_days,
        }
    }

    fn metrics_url(&self) -> String {
        let end = Utc::now();
        let start = end - ChronoDuration::days(self.window_days);
        let timespan = format!(
            "{}/{}",
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        format!(
            "{}/{}/providers/Microsoft.Insights/metrics?api-version={}&metricnames={}&aggregation=Total&interval=P1D&timespan={}",
            self.base_url,
            self.resource_id,
            METRICS_API_VERSION,
            urlencoding::encode(&format!("{},{}", PROMPT_METRIC, COMPLETION_METRIC)),
            urlencoding::encode(&timespan),
        )
    }
}

#[async_trait]
impl UsageMetrics for AzureMonitorUsage {
    async fn lifetime_usage(&self) -> Result<TokenTotals, UsageError> {
        let resp = self
            .client
            .get(self.metrics_url())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| UsageError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(UsageError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MetricsResponse =
            serde_json::from_str(&text).map_err(|e| UsageError::Parse(e.to_string()))?;
        let totals = sum_token_metrics(&parsed)?;
        tracing::debug!(
            prompt_tokens = totals.prompt_tokens,
            completion_tokens = totals.completion_tokens,
            "Fetched token usage"
        );
        Ok(totals)
    }
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    value: Vec<Metric>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    name: MetricName,
    #[serde(default)]
    timeseries: Vec<TimeSeries>,
}

#[derive(Debug, Deserialize)]
struct MetricName {
    value: String,
}

#[derive(Debug, Deserialize)]
struct TimeSeries {
    #[serde(default)]
    data: Vec<MetricValue>,
}

#[derive(Debug, Deserialize)]
struct MetricValue {
    #[serde(default)]
    total: Option<f64>,
}

fn metric_total(response: &MetricsResponse, name: &str) -> Result<u64, UsageError> {
    let metric = response
        .value
        .iter()
        .find(|m| m.name.value == name)
        .ok_or_else(|| UsageError::MissingMetric(name.to_string()))?;

    // Only the first series is meaningful: the query has no dimension split.
    let total = metric
        .timeseries
        .first()
        .map(|series| {
            series
                .data
                .iter()
                .map(|point| point.total.unwrap_or(0.0).max(0.0) as u64)
                .sum()
        })
        .unwrap_or(0);
    Ok(total)
}

fn sum_token_metrics(response: &MetricsResponse) -> Result<TokenTotals, UsageError> {
    Ok(TokenTotals {
        prompt_tokens: metric_total(response, PROMPT_METRIC)?,
        completion_tokens: metric_total(response, COMPLETION_METRIC)?,
    })
}
