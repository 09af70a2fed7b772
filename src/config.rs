//! Configuration management for the Fingertips agent service.
//!
//! Configuration is set via environment variables:
//! - `AZURE_AI_ENDPOINT` - Required. Base URL of the agents REST API.
//! - `AZURE_AI_TOKEN` - Required. Bearer token for the agents API.
//! - `AZURE_AI_MODEL_DEPLOYMENT` - Required. Model deployment the agent runs on.
//! - `AZURE_AI_RESOURCE_ID` - Required. Resource whose token metrics drive the budget gate.
//! - `AZURE_MANAGEMENT_TOKEN` - Optional. Bearer token for the metrics API. Defaults to `AZURE_AI_TOKEN`.
//! - `AZURE_AI_API_VERSION` - Optional. Agents API version. Defaults to `v1`.
//! - `TOOL_CONTRACT_PATH` - Optional. OpenAPI contract handed to the agent.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `POLL_INTERVAL_MS` - Optional. Delay between run status polls. Defaults to `500`.
//! - `RUN_TIMEOUT_SECS` - Optional. Maximum total wait for a run. Defaults to `300`.
//! - `CALL_TIMEOUT_SECS` - Optional. Timeout for a single remote call. Defaults to `60`.
//! - `PROJECT_BUDGET_USD` - Optional. Spending cap in dollars. Defaults to `20.00`.
//! - `COST_PER_1M_INPUT_TOKENS` / `COST_PER_1M_OUTPUT_TOKENS` - Optional. Token prices.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::budget::BudgetPricing;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings for the remote agent platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Agents API base URL
    pub endpoint: String,

    /// Bearer token for the agents API
    pub token: String,

    /// Value of the `api-version` query parameter
    pub api_version: String,

    /// Model deployment the agent is created against
    pub model_deployment: String,
}

/// Settings for the usage metrics query.
#[derive(Debug, Clone)]
pub struct UsageConfig {
    /// Resource id whose metrics are summed
    pub resource_id: String,

    /// Bearer token for the management API
    pub token: String,

    /// Trailing window the token counters cover
    pub window_days: i64,
}

/// Polling and timeout discipline for a single run.
#[derive(Debug, Clone)]
pub struct RunTiming {
    /// Delay before every status poll
    pub poll_interval: Duration,

    /// Maximum total wait for the run to reach a terminal status
    pub run_timeout: Duration,

    /// Maximum duration of any single remote call
    pub call_timeout: Duration,
}

impl Default for RunTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            run_timeout: Duration::from_secs(300),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub platform: PlatformConfig,

    pub usage: UsageConfig,

    /// Path of the OpenAPI contract submitted as the agent's data tool
    pub tool_contract_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    pub timing: RunTiming,

    pub pricing: BudgetPricing,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn parsed_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Budget must be a positive finite amount and prices finite and non-negative;
/// a NaN anywhere would make every spend comparison false.
fn validate_pricing(pricing: &BudgetPricing) -> Result<(), ConfigError> {
    let checks = [
        ("PROJECT_BUDGET_USD", pricing.budget_dollars, false),
        ("COST_PER_1M_INPUT_TOKENS", pricing.prompt_cost_per_million, true),
        ("COST_PER_1M_OUTPUT_TOKENS", pricing.completion_cost_per_million, true),
    ];
    for (name, value, zero_allowed) in checks {
        let in_range = if zero_allowed { value >= 0.0 } else { value > 0.0 };
        if !value.is_finite() || !in_range {
            return Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("{} is not a valid amount", value),
            ));
        }
    }
    Ok(())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if any of the agents API settings is absent,
    /// and `ConfigError::InvalidValue` if a numeric setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = required("AZURE_AI_TOKEN")?;

        let platform = PlatformConfig {
            endpoint: required("AZURE_AI_ENDPOINT")?,
            api_version: std::env::var("AZURE_AI_API_VERSION").unwrap_or_else(|_| "v1".to_string()),
            model_deployment: required("AZURE_AI_MODEL_DEPLOYMENT")?,
            token: token.clone(),
        };

        let usage = UsageConfig {
            resource_id: required("AZURE_AI_RESOURCE_ID")?,
            token: std::env::var("AZURE_MANAGEMENT_TOKEN").unwrap_or(token),
            window_days: 60,
        };

        let tool_contract_path = std::env::var("TOOL_CONTRACT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("wwwroot/fingertips_api_spec_subset.json"));

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parsed_or("PORT", 3000u16)?;

        let timing = RunTiming {
            poll_interval: Duration::from_millis(parsed_or("POLL_INTERVAL_MS", 500u64)?),
            run_timeout: Duration::from_secs(parsed_or("RUN_TIMEOUT_SECS", 300u64)?),
            call_timeout: Duration::from_secs(parsed_or("CALL_TIMEOUT_SECS", 60u64)?),
        };

        let defaults = BudgetPricing::default();
        let pricing = BudgetPricing {
            budget_dollars: parsed_or("PROJECT_BUDGET_USD", defaults.budget_dollars)?,
            prompt_cost_per_million: parsed_or(
                "COST_PER_1M_INPUT_TOKENS",
                defaults.prompt_cost_per_million,
            )?,
            completion_cost_per_million: parsed_or(
                "COST_PER_1M_OUTPUT_TOKENS",
                defaults.completion_cost_per_million,
            )?,
        };
        validate_pricing(&pricing)?;

        Ok(Self {
            platform,
            usage,
            tool_contract_path,
            host,
            port,
            timing,
            pricing,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(endpoint: String, token: String, model_deployment: String, resource_id: String) -> Self {
        Self {
            platform: PlatformConfig {
                endpoint,
                token: token.clone(),
                api_version: "v1".to_string(),
                model_deployment,
            },
            usage: UsageConfig {
                resource_id,
                token,
                window_days: 60,
            },
            tool_contract_path: PathBuf::from("wwwroot/fingertips_api_spec_subset.json"),
            host: "127.0.0.1".to_string(),
            port: 3000,
            timing: RunTiming::default(),
            pricing: BudgetPricing::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_documented_defaults() {
        let config = Config::new(
            "https://example.services.ai.azure.com/api/projects/p".to_string(),
            "token".to_string(),
            "gpt-4o-mini".to_string(),
            "/subscriptions/s/resourceGroups/r".to_string(),
        );

        assert_eq!(config.port, 3000);
        assert_eq!(config.platform.api_version, "v1");
        assert_eq!(config.timing.poll_interval, Duration::from_millis(500));
        assert_eq!(config.usage.window_days, 60);
        assert_eq!(config.usage.token, "token");
        assert!((config.pricing.budget_dollars - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pricing_rejects_non_finite_and_non_positive() {
        assert!(validate_pricing(&BudgetPricing::default()).is_ok());

        let nan_budget = BudgetPricing {
            budget_dollars: f64::NAN,
            ..BudgetPricing::default()
        };
        assert!(matches!(
            validate_pricing(&nan_budget),
            Err(ConfigError::InvalidValue(name, _)) if name == "PROJECT_BUDGET_USD"
        ));

        let zero_budget = BudgetPricing {
            budget_dollars: 0.0,
            ..BudgetPricing::default()
        };
        assert!(validate_pricing(&zero_budget).is_err());

        let infinite_price = BudgetPricing {
            completion_cost_per_million: f64::INFINITY,
            ..BudgetPricing::default()
        };
        assert!(matches!(
            validate_pricing(&infinite_price),
            Err(ConfigError::InvalidValue(name, _)) if name == "COST_PER_1M_OUTPUT_TOKENS"
        ));

        let negative_price = BudgetPricing {
            prompt_cost_per_million: -1.0,
            ..BudgetPricing::default()
        };
        assert!(validate_pricing(&negative_price).is_err());

        let free_tokens = BudgetPricing {
            prompt_cost_per_million: 0.0,
            ..BudgetPricing::default()
        };
        assert!(validate_pricing(&free_tokens).is_ok());
    }

    #[test]
    fn test_parsed_or_falls_back_when_unset() {
        let value: u64 = parsed_or("FINGERTIPS_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
