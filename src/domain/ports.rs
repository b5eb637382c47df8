use crate::domain::model::{
    AnalysisPlan, ChartOutcome, DatasetSummary, MetricOutcome, QueryResult, Report,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// 相對於 storage 根目錄的路徑
    pub path: String,
    pub modified: Option<SystemTime>,
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn list_files(
        &self,
        dir: &str,
    ) -> impl std::future::Future<Output = Result<Vec<FileEntry>>> + Send;
    /// 給使用者看的完整路徑
    fn display_path(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn graphql_endpoint(&self) -> &str;
    fn output_path(&self) -> &str;
    fn retry_attempts(&self) -> u32;
    fn retry_delay_ms(&self) -> u64;
    fn timeout_seconds(&self) -> u64;
    fn api_key(&self) -> Option<&str>;
    fn strict_scripts(&self) -> bool;
    fn bundle_artifacts(&self) -> bool;
}

/// 分析流程的各個階段，依序執行
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn query(&self, plan: &AnalysisPlan) -> Result<QueryResult>;
    async fn persist(&self, result: QueryResult) -> Result<DatasetSummary>;
    async fn metrics(&self, plan: &AnalysisPlan, dataset: &DatasetSummary)
        -> Result<MetricOutcome>;
    async fn charts(&self, plan: &AnalysisPlan, dataset: &DatasetSummary) -> Result<ChartOutcome>;
    async fn assemble(
        &self,
        plan: &AnalysisPlan,
        dataset: &DatasetSummary,
        metrics: &MetricOutcome,
        charts: &ChartOutcome,
    ) -> Result<Report>;
}
