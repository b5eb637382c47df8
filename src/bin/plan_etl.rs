use anyhow::Context;
use clap::Parser;
use liquidity_etl::config::PlanConfig;
use liquidity_etl::domain::model::AnalysisPlan;
use liquidity_etl::utils::error::ErrorSeverity;
use liquidity_etl::utils::{logger, validation::Validate};
use liquidity_etl::{AnalysisEngine, AnalysisPipeline, AppConfig, LocalStorage};

#[derive(Parser)]
#[command(name = "plan-etl")]
#[command(about = "Run a declarative liquidity analysis plan from a TOML file")]
struct Args {
    /// Path to TOML plan file
    #[arg(short, long, default_value = "analysis-plan.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log CPU and memory usage per stage
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show the plan without querying the endpoint
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based analysis plan");
    tracing::info!("📁 Loading plan from: {}", args.config);

    // 載入 TOML 計畫
    let plan_config = match PlanConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load plan file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證計畫
    if let Err(e) = plan_config.validate() {
        tracing::error!("❌ Plan validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let plan = plan_config.to_plan();
    display_plan_summary(&plan_config, &plan, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No query will be sent");
        perform_dry_run(&plan);
        return Ok(());
    }

    // 計畫中的端點優先，否則讀環境變數
    let mut config = match plan_config.endpoint() {
        Some(endpoint) => AppConfig::new(endpoint),
        None => AppConfig::from_env()
            .context("GRAPHQL_ENDPOINT is required when the plan has no [source] endpoint")?,
    };
    plan_config.apply_to(&mut config);
    config
        .validate()
        .context("invalid configuration after applying the plan")?;

    let monitor_enabled = args.monitor.unwrap_or(false);
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path.clone());
    let strict = config.strict_scripts;
    let pipeline = AnalysisPipeline::new(storage, config)?;
    let engine = AnalysisEngine::new_with_monitoring(pipeline, monitor_enabled).with_strict(strict);

    match engine.run(&plan).await {
        Ok(response) => {
            println!("✅ Analysis completed successfully!");
            println!("📁 Dataset: {}", response.csv_path);
            println!("📝 Report: {}", response.markdown_path);
            println!("📝 PDF: {}", response.pdf_path);
            if let Some(diagnostic) = response.metrics.diagnostic() {
                println!("⚠️ {}", diagnostic);
            }
            if let Some(bundle) = &response.bundle_path {
                println!("📦 Bundle: {}", bundle);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_plan_summary(config: &PlanConfig, plan: &AnalysisPlan, args: &Args) {
    println!("📋 Plan Summary:");
    println!(
        "  Plan: {} v{}",
        config.plan.name,
        config.plan.version.as_deref().unwrap_or("0")
    );
    println!(
        "  Source: {}",
        config.endpoint().unwrap_or("(GRAPHQL_ENDPOINT)")
    );
    println!("  Title: {}", plan.title);
    println!(
        "  Chart types: {}",
        plan.chart_types
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Bundle: {}", config.bundle_enabled());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn perform_dry_run(plan: &AnalysisPlan) {
    println!("🔍 Dry Run Analysis:");
    println!();
    println!("📡 Query:");
    for line in plan.query.lines() {
        println!("  {}", line);
    }

    println!();
    println!("📊 Metric script: {} lines", count_lines(&plan.metric_script));
    println!("📈 Chart script: {} lines", count_lines(&plan.chart_script));

    println!();
    println!("✅ Dry run complete. Remove --dry-run to execute the plan.");
}

fn count_lines(script: &str) -> usize {
    script.lines().filter(|l| !l.trim().is_empty()).count()
}
