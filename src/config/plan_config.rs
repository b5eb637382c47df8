use crate::config::app_config::AppConfig;
use crate::domain::model::{AnalysisPlan, ChartFormat};
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 宣告式分析計畫（TOML）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub plan: PlanInfo,
    pub source: Option<SourceConfig>,
    pub query: QueryConfig,
    pub metrics: Option<ScriptConfig>,
    pub charts: Option<ChartConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    pub script: String,
    pub chart_types: Option<Vec<ChartFormat>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub output_path: Option<String>,
    pub bundle: Option<bool>,
    pub strict_scripts: Option<bool>,
}

impl PlanConfig {
    /// 從 TOML 檔案載入計畫
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析計畫
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AnalysisError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換 ${VAR_NAME} 形式的環境變數，找不到時保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AnalysisError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("plan.name", &self.plan.name)?;
        validation::validate_non_empty_string("query.text", &self.query.text)?;

        if let Some(endpoint) = self.source.as_ref().and_then(|s| s.endpoint.as_deref()) {
            validation::validate_url("source.endpoint", endpoint)?;
        }

        if let Some(retries) = self.source.as_ref().and_then(|s| s.retry_attempts) {
            validation::validate_range("source.retry_attempts", retries, 0, 10)?;
        }

        if let Some(output) = self.report.as_ref().and_then(|r| r.output_path.as_deref()) {
            validation::validate_path("report.output_path", output)?;
        }

        if let Some(charts) = &self.charts {
            if charts.chart_types.as_ref().is_some_and(|types| types.is_empty()) {
                return Err(AnalysisError::InvalidConfigValueError {
                    field: "charts.chart_types".to_string(),
                    value: "[]".to_string(),
                    reason: "At least one chart type is required".to_string(),
                });
            }
        }

        Ok(())
    }

    /// 計畫中的端點優先，其次為環境變數
    pub fn endpoint(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.endpoint.as_deref())
    }

    pub fn bundle_enabled(&self) -> bool {
        self.report.as_ref().and_then(|r| r.bundle).unwrap_or(false)
    }

    /// 以計畫的設定覆蓋應用程式設定
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            if let Some(endpoint) = &source.endpoint {
                config.graphql_endpoint = endpoint.clone();
            }
            if let Some(api_key) = &source.api_key {
                config.api_key = Some(api_key.clone());
            }
            if let Some(timeout) = source.timeout_seconds {
                config.timeout_seconds = timeout;
            }
            if let Some(retries) = source.retry_attempts {
                config.retry_attempts = retries;
            }
            if let Some(delay) = source.retry_delay_ms {
                config.retry_delay_ms = delay;
            }
        }

        if let Some(report) = &self.report {
            if let Some(output) = &report.output_path {
                config.output_path = output.clone();
            }
            if let Some(bundle) = report.bundle {
                config.bundle_artifacts = bundle;
            }
            if let Some(strict) = report.strict_scripts {
                config.strict_scripts = strict;
            }
        }
    }

    pub fn to_plan(&self) -> AnalysisPlan {
        let report = self.report.as_ref();
        AnalysisPlan {
            title: report
                .and_then(|r| r.title.clone())
                .unwrap_or_else(|| self.plan.name.clone()),
            question: self
                .plan
                .question
                .clone()
                .or_else(|| self.plan.description.clone())
                .unwrap_or_else(|| self.plan.name.clone()),
            query: self.query.text.clone(),
            metric_script: self
                .metrics
                .as_ref()
                .map(|m| m.script.clone())
                .unwrap_or_default(),
            chart_script: self
                .charts
                .as_ref()
                .map(|c| c.script.clone())
                .unwrap_or_default(),
            chart_types: self
                .charts
                .as_ref()
                .and_then(|c| c.chart_types.clone())
                .unwrap_or_else(ChartFormat::all),
            report_name: report
                .and_then(|r| r.filename.clone())
                .or_else(|| Some(self.plan.name.clone())),
        }
    }
}

impl Validate for PlanConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
