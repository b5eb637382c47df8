use crate::domain::model::{AnalysisPlan, AnalysisResponse, ChartOutcome, MetricOutcome};
use crate::domain::ports::Pipeline;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// 依序執行查詢、存檔、指標、圖表與報告
pub struct AnalysisEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
    strict: bool,
}

impl<P: Pipeline> AnalysisEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
            strict: false,
        }
    }

    /// 腳本失敗時中止整個流程，而不是寫進報告
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self, plan: &AnalysisPlan) -> Result<AnalysisResponse> {
        let start_time = Instant::now();
        tracing::info!("🚀 Starting analysis: {}", plan.title);
        self.monitor.log_stats("Start");

        // Query
        tracing::info!("📡 Querying subgraph...");
        let result = self.pipeline.query(plan).await?;

        // Persist
        let dataset = self.pipeline.persist(result).await?;
        self.monitor.log_stats("Persist");

        // Metrics
        tracing::info!("📊 Running metric script...");
        let metrics = self.pipeline.metrics(plan, &dataset).await?;
        if let MetricOutcome::Failed { diagnostic } = &metrics {
            if self.strict {
                return Err(AnalysisError::ExecutionError {
                    stage: "metric".to_string(),
                    message: diagnostic.clone(),
                });
            }
        }

        // Charts
        tracing::info!("📈 Running chart script...");
        let charts = self.pipeline.charts(plan, &dataset).await?;
        if let ChartOutcome::Failed { diagnostic } = &charts {
            if self.strict {
                return Err(AnalysisError::ExecutionError {
                    stage: "chart".to_string(),
                    message: diagnostic.clone(),
                });
            }
        }
        self.monitor.log_stats("Scripts");

        // Report
        let report = self
            .pipeline
            .assemble(plan, &dataset, &metrics, &charts)
            .await?;

        let files = charts.files();
        tracing::info!(
            "✅ Analysis completed in {:?}: {}",
            start_time.elapsed(),
            report.markdown_path
        );
        self.monitor.log_final_stats();

        Ok(AnalysisResponse {
            markdown_report: report.markdown,
            markdown_path: report.markdown_path,
            csv_path: dataset.display_path,
            metrics,
            html_paths: files.html_files,
            png_paths: files.png_files,
            pdf_path: report.pdf_path,
            bundle_path: report.bundle_path,
        })
    }
}
