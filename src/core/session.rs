use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tabled::builder::Builder;
use tabled::settings::Style;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntry {
    pub index: usize,
    pub question: String,
    pub started_at: DateTime<Local>,
    pub duration_ms: u128,
    pub status: RunStatus,
    pub report_path: Option<String>,
    pub error: Option<String>,
}

/// 互動模式下每一輪問答的紀錄，只會新增
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<RunEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(
        &mut self,
        question: &str,
        started_at: DateTime<Local>,
        duration_ms: u128,
        report_path: &str,
    ) -> &RunEntry {
        self.push(RunEntry {
            index: self.entries.len() + 1,
            question: question.to_string(),
            started_at,
            duration_ms,
            status: RunStatus::Succeeded,
            report_path: Some(report_path.to_string()),
            error: None,
        })
    }

    pub fn record_failure(
        &mut self,
        question: &str,
        started_at: DateTime<Local>,
        duration_ms: u128,
        error: &str,
    ) -> &RunEntry {
        self.push(RunEntry {
            index: self.entries.len() + 1,
            question: question.to_string(),
            started_at,
            duration_ms,
            status: RunStatus::Failed,
            report_path: None,
            error: Some(error.to_string()),
        })
    }

    fn push(&mut self, entry: RunEntry) -> &RunEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[RunEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == RunStatus::Succeeded)
            .count()
    }

    /// 結束時印出的摘要表格
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "No questions were analyzed.".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "question", "status", "duration", "result"].map(String::from));
        for entry in &self.entries {
            let status = match entry.status {
                RunStatus::Succeeded => "ok",
                RunStatus::Failed => "failed",
            };
            let result = entry
                .report_path
                .clone()
                .or_else(|| entry.error.clone())
                .unwrap_or_default();
            builder.push_record([
                entry.index.to_string(),
                truncate(&entry.question, 48),
                status.to_string(),
                format!("{:.1}s", entry.duration_ms as f64 / 1000.0),
                truncate(&result, 80),
            ]);
        }

        let mut table = builder.build();
        table.with(Style::markdown());
        format!(
            "{}\n\n{} of {} questions succeeded",
            table,
            self.succeeded(),
            self.entries.len()
        )
    }
}

fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace(['\n', '|'], " ");
    if single_line.chars().count() <= max {
        single_line
    } else {
        let cut: String = single_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
