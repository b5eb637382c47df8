use crate::adapters::graphql::QueryExecutor;
use crate::core::charts::ChartRunner;
use crate::core::dataset;
use crate::core::metrics::MetricRunner;
use crate::core::report::ReportAssembler;
use crate::domain::model::{
    AnalysisPlan, ChartOutcome, DatasetSummary, MetricOutcome, QueryResult, Report,
};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;

pub const DATASET_FILE: &str = "query_results.csv";

/// 預設的分析流程：GraphQL 查詢、CSV、腳本、報告，全部寫到同一個執行目錄
pub struct AnalysisPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    executor: QueryExecutor,
    metric_runner: MetricRunner,
    run_dir: String,
}

impl<S: Storage, C: ConfigProvider> AnalysisPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let executor = QueryExecutor::new(&config)?;
        let run_dir = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        Ok(Self {
            storage,
            config,
            executor,
            metric_runner: MetricRunner::default(),
            run_dir,
        })
    }

    /// 指定執行目錄（相對於 storage 根目錄）
    pub fn with_run_dir(mut self, run_dir: impl Into<String>) -> Self {
        self.run_dir = run_dir.into();
        self
    }

    pub fn run_dir(&self) -> &str {
        &self.run_dir
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn dataset_path(&self) -> String {
        if self.run_dir.is_empty() {
            DATASET_FILE.to_string()
        } else {
            format!("{}/{}", self.run_dir, DATASET_FILE)
        }
    }
}

#[async_trait]
impl<S, C> Pipeline for AnalysisPipeline<S, C>
where
    S: Storage,
    C: ConfigProvider,
{
    async fn query(&self, plan: &AnalysisPlan) -> Result<QueryResult> {
        self.executor.execute(&plan.query).await
    }

    async fn persist(&self, result: QueryResult) -> Result<DatasetSummary> {
        dataset::persist(&self.storage, &self.dataset_path(), result).await
    }

    async fn metrics(
        &self,
        plan: &AnalysisPlan,
        dataset: &DatasetSummary,
    ) -> Result<MetricOutcome> {
        Ok(self
            .metric_runner
            .run(&self.storage, &dataset.file_path, &plan.metric_script)
            .await)
    }

    async fn charts(&self, plan: &AnalysisPlan, dataset: &DatasetSummary) -> Result<ChartOutcome> {
        ChartRunner::new(plan.chart_types.clone())
            .run(
                &self.storage,
                &dataset.file_path,
                &self.run_dir,
                &plan.chart_script,
            )
            .await
    }

    async fn assemble(
        &self,
        plan: &AnalysisPlan,
        dataset: &DatasetSummary,
        metrics: &MetricOutcome,
        charts: &ChartOutcome,
    ) -> Result<Report> {
        ReportAssembler::new(self.config.bundle_artifacts())
            .assemble(&self.storage, &self.run_dir, plan, dataset, metrics, charts)
            .await
    }
}
