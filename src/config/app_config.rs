use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const ENV_GRAPHQL_ENDPOINT: &str = "GRAPHQL_ENDPOINT";
pub const ENV_GRAPHQL_API_KEY: &str = "GRAPHQL_API_KEY";
pub const ENV_GRAPHQL_RETRIES: &str = "GRAPHQL_RETRIES";
pub const ENV_GRAPHQL_TIMEOUT: &str = "GRAPHQL_TIMEOUT_SECONDS";
pub const ENV_OUTPUT_PATH: &str = "LIQUIDITY_ETL_OUTPUT";

/// 程式啟動時建立一次，之後以參考或所有權傳入各元件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub graphql_endpoint: String,
    pub output_path: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub strict_scripts: bool,
    pub bundle_artifacts: bool,
}

impl AppConfig {
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_OUTPUT_PATH: &'static str = "./output";

    pub fn new(graphql_endpoint: impl Into<String>) -> Self {
        Self {
            graphql_endpoint: graphql_endpoint.into(),
            output_path: Self::DEFAULT_OUTPUT_PATH.to_string(),
            retry_attempts: Self::DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: Self::DEFAULT_RETRY_DELAY_MS,
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
            api_key: None,
            strict_scripts: false,
            bundle_artifacts: false,
        }
    }

    /// 從環境變數（以及 .env）載入，缺少端點時立即失敗
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_GRAPHQL_ENDPOINT).filter(|value| !value.trim().is_empty());
        let endpoint = validation::validate_required_field(ENV_GRAPHQL_ENDPOINT, &endpoint)?;

        let mut config = Self::new(endpoint.trim());

        if let Some(output) = lookup(ENV_OUTPUT_PATH) {
            config.output_path = output;
        }
        if let Some(retries) = lookup(ENV_GRAPHQL_RETRIES) {
            config.retry_attempts = parse_number(ENV_GRAPHQL_RETRIES, &retries)?;
        }
        if let Some(timeout) = lookup(ENV_GRAPHQL_TIMEOUT) {
            config.timeout_seconds = parse_number(ENV_GRAPHQL_TIMEOUT, &timeout)?;
        }
        config.api_key = lookup(ENV_GRAPHQL_API_KEY).filter(|key| !key.is_empty());

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "Expected a non-negative integer".to_string(),
        })
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("graphql_endpoint", &self.graphql_endpoint)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_range("retry_attempts", self.retry_attempts, 0, 10)?;
        validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;
        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn graphql_endpoint(&self) -> &str {
        &self.graphql_endpoint
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn strict_scripts(&self) -> bool {
        self.strict_scripts
    }

    fn bundle_artifacts(&self) -> bool {
        self.bundle_artifacts
    }
}
