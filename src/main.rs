use chrono::Local;
use clap::Parser;
use liquidity_etl::core::planner::SchemaCatalog;
use liquidity_etl::core::session::RunLog;
use liquidity_etl::domain::model::AnalysisResponse;
use liquidity_etl::utils::error::{AnalysisError, ErrorSeverity};
use liquidity_etl::utils::{logger, validation::Validate};
use liquidity_etl::{
    AnalysisEngine, AnalysisPipeline, AppConfig, CliConfig, KeywordPlanner, LocalStorage,
};
use std::io::Write;
use std::time::Instant;
use tokio::io::AsyncBufReadExt;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting liquidity-etl CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = cli.validate() {
        exit_with(&e);
    }

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    cli.apply_to(&mut config);
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let mut planner = KeywordPlanner::new();
    if let Some(schema) = &cli.schema {
        match SchemaCatalog::from_file(schema) {
            Ok(catalog) => {
                tracing::info!("📚 Loaded {} entities from {}", catalog.len(), schema);
                planner = planner.with_catalog(catalog);
            }
            Err(e) => exit_with(&e),
        }
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if cli.interactive {
        run_interactive(&cli, &config, &planner).await;
        return;
    }

    let question = cli.query.clone().unwrap_or_default();
    match analyze(&cli, &config, &planner, &question, None).await {
        Ok(response) => print_response(&response),
        Err(e) => exit_with(&e),
    }
}

async fn analyze(
    cli: &CliConfig,
    config: &AppConfig,
    planner: &KeywordPlanner,
    question: &str,
    run_dir: Option<String>,
) -> Result<AnalysisResponse, AnalysisError> {
    let plan = planner.plan(&cli.to_request(question))?;
    tracing::debug!("Planned query:\n{}", plan.query);

    let storage = LocalStorage::new(config.output_path.clone());
    let mut pipeline = AnalysisPipeline::new(storage, config.clone())?;
    if let Some(run_dir) = run_dir {
        pipeline = pipeline.with_run_dir(run_dir);
    }

    AnalysisEngine::new_with_monitoring(pipeline, cli.monitor)
        .with_strict(config.strict_scripts)
        .run(&plan)
        .await
}

/// 逐行讀取問題直到 exit / quit / EOF；單一問題失敗不會結束對話
async fn run_interactive(cli: &CliConfig, config: &AppConfig, planner: &KeywordPlanner) {
    let mut log = RunLog::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    println!("Ask a question about liquidity pools (type 'exit' to quit).");
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("❌ Failed to read input: {}", e);
                break;
            }
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let started_at = Local::now();
        let timer = Instant::now();
        let run_dir = format!("{}_{}", started_at.format("%Y%m%d_%H%M%S"), log.len() + 1);

        match analyze(cli, config, planner, question, Some(run_dir)).await {
            Ok(response) => {
                print_response(&response);
                log.record_success(
                    question,
                    started_at,
                    timer.elapsed().as_millis(),
                    &response.markdown_path,
                );
            }
            Err(e) => {
                report_error(&e);
                log.record_failure(
                    question,
                    started_at,
                    timer.elapsed().as_millis(),
                    &e.user_friendly_message(),
                );
            }
        }
    }

    println!();
    println!("{}", log.summary());
}

fn print_response(response: &AnalysisResponse) {
    println!("{}", response.markdown_report);
    println!("✅ Analysis completed successfully!");
    println!("📁 Dataset: {}", response.csv_path);
    for path in response.html_paths.iter().chain(response.png_paths.iter()) {
        println!("📈 Chart: {}", path);
    }
    println!("📝 Markdown report: {}", response.markdown_path);
    println!("📝 PDF report: {}", response.pdf_path);
    if let Some(bundle) = &response.bundle_path {
        println!("📦 Bundle: {}", bundle);
    }
}

fn report_error(e: &AnalysisError) {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
}

fn exit_with(e: &AnalysisError) -> ! {
    report_error(e);

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
