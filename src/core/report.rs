use crate::adapters::render::pdf;
use crate::core::charts::sanitize_name;
use crate::domain::model::{
    AnalysisPlan, ChartOutcome, DatasetSummary, MetricOutcome, Report,
};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tabled::builder::Builder;
use tabled::settings::Style;
use zip::write::{FileOptions, ZipWriter};

const DISCLAIMER: &str = "_Figures above are computed directly from the retrieved subgraph records. \
Any interpretation beyond them is inferred and not directly present in the data._";

/// 報告檔名：建議名稱 + 日期，或 `report_<時間戳>`
pub fn report_name(suggested: Option<&str>, now: &DateTime<Local>) -> String {
    let cleaned = suggested
        .map(|name| {
            let stem = name
                .trim()
                .trim_end_matches(".pdf")
                .trim_end_matches(".md");
            sanitize_name(stem)
        })
        .unwrap_or_default();

    if cleaned.is_empty() {
        format!("report_{}", now.format("%Y%m%d_%H%M%S"))
    } else {
        format!("{}_{}", cleaned, now.format("%Y%m%d"))
    }
}

fn format_stat(value: &Value) -> String {
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Some(n) => {
            let text = format!("{:.4}", n);
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        None => String::new(),
    }
}

fn summary_table(dataset: &DatasetSummary) -> Option<String> {
    if dataset.summary.is_empty() {
        return None;
    }
    let stats = ["count", "mean", "std", "min", "max"];
    let mut builder = Builder::default();
    let mut header = vec!["column".to_string()];
    header.extend(stats.iter().map(|s| s.to_string()));
    builder.push_record(header);

    for (column, values) in &dataset.summary {
        let mut row = vec![column.clone()];
        row.extend(stats.iter().map(|s| {
            values.get(*s).map(format_stat).unwrap_or_default()
        }));
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::markdown());
    Some(table.to_string())
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// 組出 markdown 報告內容
pub fn build_markdown(
    plan: &AnalysisPlan,
    dataset: &DatasetSummary,
    metrics: &MetricOutcome,
    charts: &ChartOutcome,
    generated_at: &DateTime<Local>,
) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", plan.title));
    md.push_str(&format!(
        "*Generated {}*\n\n",
        generated_at.format("%Y-%m-%d %H:%M")
    ));

    md.push_str("## Question\n\n");
    md.push_str(&format!("{}\n\n", plan.question));

    md.push_str("## Dataset\n\n");
    md.push_str(&format!("- Records: **{}**\n", dataset.row_count));
    md.push_str(&format!("- Columns: {}\n", dataset.columns.join(", ")));
    md.push_str(&format!("- Source file: `{}`\n\n", file_name(&dataset.file_path)));
    if let Some(table) = summary_table(dataset) {
        md.push_str("### Summary statistics\n\n");
        md.push_str(&table);
        md.push_str("\n\n");
    }

    md.push_str("## Metrics\n\n");
    match metrics {
        MetricOutcome::Completed(result) => {
            if let Some(table) = &result.table_output {
                md.push_str(table);
                md.push_str("\n\n");
            }
            if !result.output.trim().is_empty() {
                md.push_str("```text\n");
                md.push_str(result.output.trim_end());
                md.push_str("\n```\n\n");
            }
            if result.table_output.is_none() && result.output.trim().is_empty() {
                md.push_str("_The metric script produced no output._\n\n");
            }
        }
        MetricOutcome::Failed { diagnostic } => {
            md.push_str(&format!("> {}\n\n", diagnostic));
        }
    }

    md.push_str("## Charts\n\n");
    match charts {
        ChartOutcome::Completed(files) if files.is_empty() => {
            md.push_str("_No charts were produced._\n\n");
        }
        ChartOutcome::Completed(files) => {
            for png in &files.png_files {
                let name = file_name(png);
                md.push_str(&format!("![{}]({})\n\n", name, name));
            }
            for html in &files.html_files {
                let name = file_name(html);
                md.push_str(&format!("- Interactive: [{}]({})\n", name, name));
            }
            md.push('\n');
        }
        ChartOutcome::Failed { diagnostic } => {
            md.push_str(&format!("> {}\n\n", diagnostic));
        }
    }

    md.push_str("## Query\n\n```graphql\n");
    md.push_str(plan.query.trim());
    md.push_str("\n```\n\n---\n\n");
    md.push_str(DISCLAIMER);
    md.push('\n');
    md
}

/// 寫出 markdown、PDF，必要時打包 zip
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    bundle: bool,
}

impl ReportAssembler {
    pub fn new(bundle: bool) -> Self {
        Self { bundle }
    }

    pub async fn assemble<S: Storage>(
        &self,
        storage: &S,
        run_dir: &str,
        plan: &AnalysisPlan,
        dataset: &DatasetSummary,
        metrics: &MetricOutcome,
        charts: &ChartOutcome,
    ) -> Result<Report> {
        let now = Local::now();
        let name = report_name(plan.report_name.as_deref(), &now);
        let markdown = build_markdown(plan, dataset, metrics, charts, &now);

        let markdown_path = format!("{}/{}.md", run_dir, name);
        storage
            .write_file(&markdown_path, markdown.as_bytes())
            .await?;

        let pdf_path = format!("{}/{}.pdf", run_dir, name);
        let pdf_bytes = pdf::render_pdf(&plan.title, &markdown);
        storage.write_file(&pdf_path, &pdf_bytes).await?;
        tracing::info!("📝 Report written to {}", storage.display_path(&markdown_path));

        let files = charts.files();
        let bundle_path = if self.bundle {
            let mut entries = vec![
                dataset.file_path.clone(),
                markdown_path.clone(),
                pdf_path.clone(),
            ];
            entries.extend(
                files
                    .html_files
                    .iter()
                    .chain(files.png_files.iter())
                    .map(|path| format!("{}/{}", run_dir, file_name(path))),
            );
            let zip_path = format!("{}/{}.zip", run_dir, name);
            write_bundle(storage, &zip_path, &entries).await?;
            Some(storage.display_path(&zip_path))
        } else {
            None
        };

        Ok(Report {
            markdown,
            markdown_path: storage.display_path(&markdown_path),
            pdf_path: storage.display_path(&pdf_path),
            charts: files.artifacts(),
            bundle_path,
        })
    }
}

async fn write_bundle<S: Storage>(storage: &S, zip_path: &str, entries: &[String]) -> Result<()> {
    let mut contents = Vec::with_capacity(entries.len());
    for entry in entries {
        contents.push((file_name(entry), storage.read_file(entry).await?));
    }

    let zip_data = {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in &contents {
            zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
            zip.write_all(data)?;
        }
        let cursor = zip.finish()?;
        cursor.into_inner()
    };

    tracing::debug!("Writing bundle ({} bytes, {} files)", zip_data.len(), contents.len());
    storage.write_file(zip_path, &zip_data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::model::{ChartFiles, ChartFormat, MetricsResult};
    use chrono::TimeZone;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn plan(report_name: Option<&str>) -> AnalysisPlan {
        AnalysisPlan {
            title: "Swap activity".to_string(),
            question: "top swaps this week".to_string(),
            query: "{ swaps(first: 10) { id amountUSD } }".to_string(),
            metric_script: String::new(),
            chart_script: String::new(),
            chart_types: vec![ChartFormat::Html],
            report_name: report_name.map(str::to_string),
        }
    }

    fn dataset() -> DatasetSummary {
        let mut summary = Map::new();
        summary.insert(
            "amountUSD".to_string(),
            json!({"count": 2, "mean": 15.0, "std": 7.0710678, "min": 10, "max": 20}),
        );
        DatasetSummary {
            file_path: "run/query_results.csv".to_string(),
            display_path: "/tmp/run/query_results.csv".to_string(),
            row_count: 2,
            columns: vec!["id".to_string(), "amountUSD".to_string()],
            summary,
        }
    }

    #[test]
    fn test_report_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 30, 15).unwrap();
        assert_eq!(report_name(Some("Pool Report.pdf"), &now), "Pool_Report_20240305");
        assert_eq!(report_name(None, &now), "report_20240305_143015");
        assert_eq!(report_name(Some("  "), &now), "report_20240305_143015");
    }

    #[test]
    fn test_markdown_sections() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 30, 15).unwrap();
        let metrics = MetricOutcome::Completed(MetricsResult {
            metrics: Map::new(),
            table_output: None,
            output: "value=5\n".to_string(),
        });
        let charts = ChartOutcome::Completed(ChartFiles {
            html_files: vec!["/tmp/run/volume.html".to_string()],
            png_files: vec!["/tmp/run/volume.png".to_string()],
        });

        let md = build_markdown(&plan(None), &dataset(), &metrics, &charts, &now);
        assert!(md.starts_with("# Swap activity\n"));
        assert!(md.contains("*Generated 2024-03-05 14:30*"));
        assert!(md.contains("value=5"));
        assert!(md.contains("![volume.png](volume.png)"));
        assert!(md.contains("[volume.html](volume.html)"));
        assert!(md.contains("| amountUSD"));
        assert!(md.contains("7.0711"));
        assert!(md.contains("inferred"));
    }

    #[test]
    fn test_markdown_without_charts() {
        let now = Local::now();
        let metrics = MetricOutcome::Failed {
            diagnostic: "Failed to run script. Error: line 1: boom".to_string(),
        };
        let charts = ChartOutcome::Completed(ChartFiles::default());
        let md = build_markdown(&plan(None), &dataset(), &metrics, &charts, &now);
        assert!(md.contains("No charts were produced"));
        assert!(md.contains("> Failed to run script. Error: line 1: boom"));
    }

    #[tokio::test]
    async fn test_assemble_writes_markdown_pdf_and_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
        storage
            .write_file("run/query_results.csv", b"id,amountUSD\na,10\nb,20\n")
            .await
            .unwrap();

        let metrics = MetricOutcome::Completed(MetricsResult::default());
        let charts = ChartOutcome::Completed(ChartFiles::default());
        let report = ReportAssembler::new(true)
            .assemble(&storage, "run", &plan(Some("swaps")), &dataset(), &metrics, &charts)
            .await
            .unwrap();

        assert!(report.markdown_path.ends_with(".md"));
        assert!(std::path::Path::new(&report.pdf_path).exists());
        let bundle = report.bundle_path.unwrap();
        let archive = zip::ZipArchive::new(std::fs::File::open(&bundle).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        assert!(file_name(&bundle).starts_with("swaps_"));
    }
}
