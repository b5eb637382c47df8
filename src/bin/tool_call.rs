use anyhow::{bail, Context};
use clap::Parser;
use liquidity_etl::core::tools::{ToolCall, Toolbox};
use liquidity_etl::utils::{logger, validation::Validate};
use liquidity_etl::{AppConfig, LocalStorage};

#[derive(Parser)]
#[command(name = "tool-call")]
#[command(about = "Dispatch one query, columns, metric or chart tool call given as JSON")]
struct Args {
    /// Tool call as JSON, e.g. {"tool":"metric","dataset":"run/query_results.csv","script":"..."}
    #[arg(long, conflicts_with = "call_file")]
    call: Option<String>,

    /// Read the tool call JSON from a file
    #[arg(long)]
    call_file: Option<String>,

    /// Output directory, overrides LIQUIDITY_ETL_OUTPUT
    #[arg(long)]
    output_path: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 日誌寫到 stderr，stdout 只輸出 JSON
    logger::init_cli_logger(args.verbose);

    let raw = match (&args.call, &args.call_file) {
        (Some(call), _) => call.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read tool call from {}", path))?,
        (None, None) => bail!("either --call or --call-file is required"),
    };
    let call: ToolCall = serde_json::from_str(&raw).context("invalid tool call JSON")?;

    let mut config = AppConfig::from_env()?;
    if let Some(output) = args.output_path {
        config.output_path = output;
    }
    config.validate()?;

    let storage = LocalStorage::new(config.output_path.clone());
    let toolbox = Toolbox::new(storage, &config)?;

    match toolbox.dispatch(call).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("❌ Tool call failed: {}", e);
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            Err(e.into())
        }
    }
}
