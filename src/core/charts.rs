use crate::adapters::render::{html, png, ChartSpec};
use crate::core::dataset;
use crate::core::metrics::FAILURE_PREFIX;
use crate::core::script::{self, CollectCharts, ScriptLimits};
use crate::domain::model::{ChartFiles, ChartFormat, ChartOutcome};
use crate::domain::ports::{FileEntry, Storage};
use crate::utils::error::Result;
use std::collections::HashMap;

/// 執行圖表腳本並輸出 html / png
#[derive(Debug, Clone)]
pub struct ChartRunner {
    formats: Vec<ChartFormat>,
    prefix: String,
    limits: ScriptLimits,
}

impl Default for ChartRunner {
    fn default() -> Self {
        Self::new(ChartFormat::all())
    }
}

impl ChartRunner {
    pub fn new(formats: Vec<ChartFormat>) -> Self {
        Self {
            formats,
            prefix: String::new(),
            limits: ScriptLimits::default(),
        }
    }

    /// 輸出檔名前綴
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = sanitize_name(&prefix.into());
        self
    }

    pub fn with_limits(mut self, limits: ScriptLimits) -> Self {
        self.limits = limits;
        self
    }

    /// 執行腳本後掃描輸出目錄，回傳新增或變更的圖檔。
    ///
    /// 腳本錯誤回傳 `ChartOutcome::Failed`；寫檔失敗則回傳錯誤。
    pub async fn run<S: Storage>(
        &self,
        storage: &S,
        dataset_path: &str,
        output_dir: &str,
        source: &str,
    ) -> Result<ChartOutcome> {
        let before = storage.list_files(output_dir).await?;

        let data = match dataset::load(storage, dataset_path).await {
            Ok(data) => data,
            Err(e) => return Ok(failed(e)),
        };

        let mut sink = CollectCharts::default();
        if let Err(e) = script::run_script(source, &data, &mut sink, self.limits) {
            return Ok(failed(e));
        }

        for request in &sink.requests {
            let mut base = sanitize_name(&request.name);
            if base.is_empty() {
                base = "chart".to_string();
            }
            let name = format!("{}{}", self.prefix, base);
            for format in &self.formats {
                let bytes = match render(&request.spec, *format) {
                    Ok(bytes) => bytes,
                    Err(e) => return Ok(failed(e)),
                };
                let path = join(output_dir, &format!("{}.{}", name, format.extension()));
                storage.write_file(&path, &bytes).await?;
                tracing::debug!("📈 Wrote chart {}", storage.display_path(&path));
            }
        }

        let after = storage.list_files(output_dir).await?;
        let files = changed_charts(&before, &after, |path| storage.display_path(path));

        if files.is_empty() {
            tracing::warn!("⚠️ Chart script produced no chart files");
        } else {
            tracing::info!(
                "📈 Produced {} html and {} png charts",
                files.html_files.len(),
                files.png_files.len()
            );
        }
        Ok(ChartOutcome::Completed(files))
    }
}

fn render(spec: &ChartSpec, format: ChartFormat) -> Result<Vec<u8>> {
    match format {
        ChartFormat::Html => Ok(html::render_chart(spec).into_bytes()),
        ChartFormat::Png => png::render_chart(spec),
    }
}

fn failed(error: impl std::fmt::Display) -> ChartOutcome {
    tracing::warn!("⚠️ Chart script failed: {}", error);
    ChartOutcome::Failed {
        diagnostic: format!("{} {}", FAILURE_PREFIX, error),
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// 比對前後兩次掃描：新檔案或修改時間不同的 html / png
pub fn changed_charts(
    before: &[FileEntry],
    after: &[FileEntry],
    display: impl Fn(&str) -> String,
) -> ChartFiles {
    let previous: HashMap<&str, &FileEntry> =
        before.iter().map(|entry| (entry.path.as_str(), entry)).collect();

    let mut files = ChartFiles::default();
    for entry in after {
        let changed = match previous.get(entry.path.as_str()) {
            None => true,
            Some(old) => old.modified != entry.modified,
        };
        if !changed {
            continue;
        }
        match ChartFormat::from_path(&entry.path) {
            Some(ChartFormat::Html) => files.html_files.push(display(&entry.path)),
            Some(ChartFormat::Png) => files.png_files.push(display(&entry.path)),
            None => {}
        }
    }
    files
}

/// 只保留英數字、`-` 與 `_`
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, LocalStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
        storage
            .write_file(
                "run/query_results.csv",
                b"date,tvlUSD\n1700006400,100\n1700092800,150\n",
            )
            .await
            .unwrap();
        (temp_dir, storage)
    }

    #[tokio::test]
    async fn test_single_chart_in_both_formats() {
        let (_temp_dir, storage) = setup().await;
        let runner = ChartRunner::default();

        let outcome = runner
            .run(
                &storage,
                "run/query_results.csv",
                "run",
                "line(date(df.date), df.tvlUSD, \"TVL\", \"chart\")",
            )
            .await
            .unwrap();

        let files = outcome.files();
        assert_eq!(files.html_files.len(), 1);
        assert_eq!(files.png_files.len(), 1);
        assert!(files.html_files[0].ends_with("run/chart.html"));
        assert!(files.png_files[0].ends_with("run/chart.png"));
    }

    #[tokio::test]
    async fn test_no_charts_is_success() {
        let (_temp_dir, storage) = setup().await;
        let outcome = ChartRunner::default()
            .run(&storage, "run/query_results.csv", "run", "x = len(df)")
            .await
            .unwrap();

        assert!(outcome.diagnostic().is_none());
        assert!(outcome.files().is_empty());
    }

    #[tokio::test]
    async fn test_script_error_is_diagnostic() {
        let (_temp_dir, storage) = setup().await;
        let outcome = ChartRunner::new(vec![ChartFormat::Html])
            .with_prefix("pool ")
            .run(&storage, "run/query_results.csv", "run", "bar(df.date)")
            .await
            .unwrap();

        assert!(outcome
            .diagnostic()
            .unwrap()
            .starts_with("Failed to run script. Error: line 1:"));
    }

    #[test]
    fn test_changed_charts_ignores_untouched_files() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(20);
        let entry = |path: &str, modified| FileEntry {
            path: path.to_string(),
            modified: Some(modified),
        };

        let before = vec![entry("run/old.html", t0), entry("run/redo.png", t0)];
        let after = vec![
            entry("run/old.html", t0),
            entry("run/redo.png", t1),
            entry("run/new.html", t1),
            entry("run/query_results.csv", t1),
        ];

        let files = changed_charts(&before, &after, |p| p.to_string());
        assert_eq!(files.html_files, vec!["run/new.html"]);
        assert_eq!(files.png_files, vec!["run/redo.png"]);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("../Daily TVL!"), "Daily_TVL");
        assert_eq!(sanitize_name("volume_by-pair"), "volume_by-pair");
    }
}
