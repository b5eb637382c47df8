use crate::core::dataset;
use crate::core::script::{self, NoCharts, ScriptLimits};
use crate::domain::model::{MetricOutcome, MetricsResult};
use crate::domain::ports::Storage;
use serde_json::{Map, Value};
use tabled::builder::Builder;
use tabled::settings::Style;

pub const FAILURE_PREFIX: &str = "Failed to run script. Error:";

/// 對資料集執行指標腳本
#[derive(Debug, Clone, Default)]
pub struct MetricRunner {
    limits: ScriptLimits,
}

impl MetricRunner {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    /// 腳本錯誤不會中斷流程，而是回傳 `MetricOutcome::Failed`
    pub async fn run<S: Storage>(
        &self,
        storage: &S,
        dataset_path: &str,
        source: &str,
    ) -> MetricOutcome {
        let data = match dataset::load(storage, dataset_path).await {
            Ok(data) => data,
            Err(e) => return failed(e),
        };

        match script::run_script(source, &data, &mut NoCharts, self.limits) {
            Ok(result) => {
                tracing::info!(
                    "📊 Metric script computed {} values ({} bytes of output)",
                    result.variables.len(),
                    result.output.len()
                );
                MetricOutcome::Completed(MetricsResult {
                    table_output: scalar_table(&result.variables),
                    metrics: result.variables,
                    output: result.output,
                })
            }
            Err(e) => failed(e),
        }
    }
}

fn failed(error: impl std::fmt::Display) -> MetricOutcome {
    let diagnostic = format!("{} {}", FAILURE_PREFIX, error);
    tracing::warn!("⚠️ Metric script failed: {}", error);
    MetricOutcome::Failed { diagnostic }
}

/// 純量指標的 markdown 表格；沒有純量時回傳 None
pub fn scalar_table(metrics: &Map<String, Value>) -> Option<String> {
    let mut builder = Builder::default();
    builder.push_record(["metric".to_string(), "value".to_string()]);

    let mut rows = 0;
    for (name, value) in metrics {
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.contains('\n') => s.clone(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        builder.push_record([name.clone(), text]);
        rows += 1;
    }

    if rows == 0 {
        return None;
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    Some(table.to_string())
}
