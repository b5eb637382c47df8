use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 單筆查詢記錄，欄位順序與伺服器回傳順序一致
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

/// 查詢結果：單一頂層欄位下的記錄
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub root_field: String,
    pub records: Vec<Record>,
}

/// 已持久化資料集的摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// 相對於 storage 根目錄
    pub file_path: String,
    /// 給使用者看的完整路徑
    pub display_path: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub summary: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsResult {
    /// 腳本中具名的計算結果
    pub metrics: Map<String, Value>,
    /// 純量指標的 markdown 表格
    pub table_output: Option<String>,
    /// 腳本 print 的輸出，原樣保留
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Completed(MetricsResult),
    Failed { diagnostic: String },
}

impl MetricOutcome {
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            MetricOutcome::Completed(_) => None,
            MetricOutcome::Failed { diagnostic } => Some(diagnostic),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    /// 互動式 HTML
    Html,
    /// 靜態 PNG
    Png,
}

impl ChartFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ChartFormat::Html => "html",
            ChartFormat::Png => "png",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let extension = std::path::Path::new(path).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "html" => Some(ChartFormat::Html),
            "png" => Some(ChartFormat::Png),
            _ => None,
        }
    }

    pub fn all() -> Vec<ChartFormat> {
        vec![ChartFormat::Html, ChartFormat::Png]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub path: String,
    pub format: ChartFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartFiles {
    pub html_files: Vec<String>,
    pub png_files: Vec<String>,
}

impl ChartFiles {
    pub fn from_artifacts(artifacts: &[ChartArtifact]) -> Self {
        let mut files = ChartFiles::default();
        for artifact in artifacts {
            match artifact.format {
                ChartFormat::Html => files.html_files.push(artifact.path.clone()),
                ChartFormat::Png => files.png_files.push(artifact.path.clone()),
            }
        }
        files
    }

    pub fn artifacts(&self) -> Vec<ChartArtifact> {
        self.html_files
            .iter()
            .map(|path| ChartArtifact {
                path: path.clone(),
                format: ChartFormat::Html,
            })
            .chain(self.png_files.iter().map(|path| ChartArtifact {
                path: path.clone(),
                format: ChartFormat::Png,
            }))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.html_files.is_empty() && self.png_files.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartOutcome {
    Completed(ChartFiles),
    Failed { diagnostic: String },
}

impl ChartOutcome {
    pub fn files(&self) -> ChartFiles {
        match self {
            ChartOutcome::Completed(files) => files.clone(),
            ChartOutcome::Failed { .. } => ChartFiles::default(),
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ChartOutcome::Completed(_) => None,
            ChartOutcome::Failed { diagnostic } => Some(diagnostic),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub markdown: String,
    pub markdown_path: String,
    pub pdf_path: String,
    pub charts: Vec<ChartArtifact>,
    pub bundle_path: Option<String>,
}

/// 使用者問題與可選的限定條件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub question: String,
    pub pool_address: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub report_name: Option<String>,
}

impl AnalysisRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }
}

/// 一次分析所需的全部宣告式內容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPlan {
    pub title: String,
    pub question: String,
    pub query: String,
    pub metric_script: String,
    pub chart_script: String,
    pub chart_types: Vec<ChartFormat>,
    pub report_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub markdown_report: String,
    pub markdown_path: String,
    pub csv_path: String,
    pub metrics: MetricOutcome,
    pub html_paths: Vec<String>,
    pub png_paths: Vec<String>,
    pub pdf_path: String,
    pub bundle_path: Option<String>,
}
