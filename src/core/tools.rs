//! One dispatch surface for the query, columns, metric and chart tools, so an outside
//! orchestrator can drive them with JSON.

use crate::adapters::graphql::QueryExecutor;
use crate::core::charts::ChartRunner;
use crate::core::dataset;
use crate::core::metrics::MetricRunner;
use crate::domain::model::{ChartFormat, ChartOutcome, DatasetSummary, MetricOutcome};
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_output_file() -> String {
    "query_results.csv".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    /// 執行 GraphQL 查詢並將結果存成 CSV
    Query {
        query: String,
        #[serde(default = "default_output_file")]
        output_file: String,
    },
    /// 列出 CSV 的欄位，不執行腳本
    Columns { dataset: String },
    /// 對 CSV 執行指標腳本
    Metric { dataset: String, script: String },
    /// 對 CSV 執行圖表腳本
    Chart {
        dataset: String,
        script: String,
        /// 預設為資料集所在目錄
        #[serde(default)]
        output_dir: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        formats: Option<Vec<ChartFormat>>,
    },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Query { .. } => "query",
            ToolCall::Columns { .. } => "columns",
            ToolCall::Metric { .. } => "metric",
            ToolCall::Chart { .. } => "chart",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolOutput {
    Query { dataset: DatasetSummary },
    Columns { columns: Vec<String>, row_count: usize },
    Metric { outcome: MetricOutcome },
    Chart { outcome: ChartOutcome },
}

pub struct Toolbox<S: Storage> {
    storage: S,
    executor: QueryExecutor,
    metrics: MetricRunner,
}

impl<S: Storage> Toolbox<S> {
    pub fn new<C: ConfigProvider>(storage: S, config: &C) -> Result<Self> {
        Ok(Self {
            storage,
            executor: QueryExecutor::new(config)?,
            metrics: MetricRunner::default(),
        })
    }

    /// 所有路徑都相對於 storage 根目錄
    pub async fn dispatch(&self, call: ToolCall) -> Result<ToolOutput> {
        tracing::info!("🔧 Dispatching {} tool", call.name());
        match call {
            ToolCall::Query { query, output_file } => {
                let result = self.executor.execute(&query).await?;
                let dataset = dataset::persist(&self.storage, &output_file, result).await?;
                Ok(ToolOutput::Query { dataset })
            }
            ToolCall::Columns { dataset } => {
                let loaded = dataset::load(&self.storage, &dataset).await?;
                Ok(ToolOutput::Columns {
                    row_count: loaded.len(),
                    columns: loaded.columns,
                })
            }
            ToolCall::Metric { dataset, script } => {
                let outcome = self.metrics.run(&self.storage, &dataset, &script).await;
                Ok(ToolOutput::Metric { outcome })
            }
            ToolCall::Chart {
                dataset,
                script,
                output_dir,
                prefix,
                formats,
            } => {
                let output_dir = output_dir.unwrap_or_else(|| parent_dir(&dataset));
                let mut runner = ChartRunner::new(formats.unwrap_or_else(ChartFormat::all));
                if let Some(prefix) = prefix {
                    runner = runner.with_prefix(prefix);
                }
                let outcome = runner
                    .run(&self.storage, &dataset, &output_dir, &script)
                    .await?;
                Ok(ToolOutput::Chart { outcome })
            }
        }
    }
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_from_json() {
        let call: ToolCall = serde_json::from_value(json!({
            "tool": "query",
            "query": "{ pools { id } }"
        }))
        .unwrap();
        assert!(matches!(
            &call,
            ToolCall::Query { output_file, .. } if output_file == "query_results.csv"
        ));

        let call: ToolCall = serde_json::from_value(json!({
            "tool": "chart",
            "dataset": "run/query_results.csv",
            "script": "x = 1",
            "formats": ["png"]
        }))
        .unwrap();
        assert_eq!(call.name(), "chart");
    }

    #[test]
    fn test_tool_output_shape() {
        let output = ToolOutput::Metric {
            outcome: MetricOutcome::Failed {
                diagnostic: "Failed to run script. Error: line 1: boom".to_string(),
            },
        };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["tool"], "metric");
        assert_eq!(value["outcome"]["status"], "failed");
    }

    #[test]
    fn test_chart_tool_defaults_to_dataset_directory() {
        use crate::adapters::storage::LocalStorage;
        use crate::config::AppConfig;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
        let toolbox = Toolbox::new(storage, &AppConfig::new("http://127.0.0.1:1/graphql")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("run")).unwrap();
        std::fs::write(temp_dir.path().join("run/data.csv"), "pair,volume\nA,1\nB,2\n").unwrap();

        let call = ToolCall::Chart {
            dataset: "run/data.csv".to_string(),
            script: "bar(df.pair, df.volume)".to_string(),
            output_dir: None,
            prefix: None,
            formats: Some(vec![ChartFormat::Html]),
        };
        let output = tokio_test::block_on(toolbox.dispatch(call)).unwrap();

        let ToolOutput::Chart { outcome } = output else {
            panic!("expected chart output");
        };
        let files = outcome.files();
        assert_eq!(files.html_files.len(), 1);
        assert!(files.html_files[0].ends_with("run/chart_1.html"));
        assert!(files.png_files.is_empty());
    }

    #[test]
    fn test_columns_tool_lists_schema() {
        use crate::adapters::storage::LocalStorage;
        use crate::config::AppConfig;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
        let toolbox = Toolbox::new(storage, &AppConfig::new("http://127.0.0.1:1/graphql")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("run")).unwrap();
        std::fs::write(
            temp_dir.path().join("run/pools.csv"),
            "id,token0_symbol,totalValueLockedUSD\n0xa,USDC,10\n0xb,WBTC,20\n",
        )
        .unwrap();

        let call: ToolCall = serde_json::from_value(json!({
            "tool": "columns",
            "dataset": "run/pools.csv"
        }))
        .unwrap();
        assert_eq!(call.name(), "columns");

        let output = tokio_test::block_on(toolbox.dispatch(call)).unwrap();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["tool"], "columns");
        assert_eq!(
            value["columns"],
            json!(["id", "token0_symbol", "totalValueLockedUSD"])
        );
        assert_eq!(value["row_count"], 2);

        let missing = ToolCall::Columns {
            dataset: "run/missing.csv".to_string(),
        };
        assert!(tokio_test::block_on(toolbox.dispatch(missing)).is_err());
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("run/query_results.csv"), "run");
        assert_eq!(parent_dir("query_results.csv"), "");
    }
}
