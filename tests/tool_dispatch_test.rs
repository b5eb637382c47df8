use httpmock::prelude::*;
use liquidity_etl::core::tools::{ToolCall, ToolOutput, Toolbox};
use liquidity_etl::domain::model::{ChartOutcome, MetricOutcome};
use liquidity_etl::{AnalysisError, AppConfig, LocalStorage};
use tempfile::TempDir;

fn toolbox(endpoint: String, temp_dir: &TempDir) -> Toolbox<LocalStorage> {
    let mut config = AppConfig::new(endpoint);
    config.retry_attempts = 0;
    let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
    Toolbox::new(storage, &config).unwrap()
}

#[tokio::test]
async fn test_query_metric_and_chart_tools_share_the_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(serde_json::json!({
            "data": {"pools": [
                {"id": "0x1", "totalValueLockedUSD": "1000", "volumeUSD": "50",
                 "token0": {"id": "0xa", "symbol": "USDC", "name": "USD Coin"},
                 "token1": {"id": "0xb", "symbol": "WETH", "name": "Wrapped Ether"}},
                {"id": "0x2", "totalValueLockedUSD": "3000", "volumeUSD": "70",
                 "token0": {"id": "0xc", "symbol": "DAI", "name": "Dai"},
                 "token1": {"id": "0xb", "symbol": "WETH", "name": "Wrapped Ether"}}
            ]}
        }));
    });
    let toolbox = toolbox(server.url("/graphql"), &temp_dir);

    let call: ToolCall = serde_json::from_value(serde_json::json!({
        "tool": "query",
        "query": "{ pools(first: 2) { id totalValueLockedUSD volumeUSD } }",
        "output_file": "session/pools.csv"
    }))
    .unwrap();
    let ToolOutput::Query { dataset } = toolbox.dispatch(call).await.unwrap() else {
        panic!("expected query output");
    };
    api_mock.assert();
    assert_eq!(dataset.file_path, "session/pools.csv");
    assert_eq!(dataset.row_count, 2);
    assert!(dataset.columns.contains(&"token0_symbol".to_string()));
    assert!(dataset.summary.contains_key("totalValueLockedUSD"));

    let metric = ToolCall::Metric {
        dataset: dataset.file_path.clone(),
        script: "total_tvl = sum(df.totalValueLockedUSD)\nprint(\"tvl=\" + str(total_tvl))"
            .to_string(),
    };
    let ToolOutput::Metric { outcome } = toolbox.dispatch(metric).await.unwrap() else {
        panic!("expected metric output");
    };
    let MetricOutcome::Completed(result) = outcome else {
        panic!("expected completed metrics");
    };
    assert_eq!(result.metrics["total_tvl"], serde_json::json!(4000));
    assert!(result.output.contains("tvl=4000"));

    let chart = ToolCall::Chart {
        dataset: dataset.file_path.clone(),
        script: "bar(df.token0_symbol, df.totalValueLockedUSD, \"TVL\", \"tvl\")".to_string(),
        output_dir: None,
        prefix: Some("pools_".to_string()),
        formats: None,
    };
    let ToolOutput::Chart { outcome } = toolbox.dispatch(chart).await.unwrap() else {
        panic!("expected chart output");
    };
    let ChartOutcome::Completed(files) = outcome else {
        panic!("expected completed charts");
    };
    assert_eq!(files.html_files.len(), 1);
    assert!(files.html_files[0].ends_with("session/pools_tvl.html"));
    assert!(files.png_files[0].ends_with("session/pools_tvl.png"));
}

#[tokio::test]
async fn test_query_tool_with_empty_result() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(serde_json::json!({"data": {"mints": null}}));
    });
    let toolbox = toolbox(server.url("/graphql"), &temp_dir);

    let err = toolbox
        .dispatch(ToolCall::Query {
            query: "{ mints { id } }".to_string(),
            output_file: "query_results.csv".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::NoDataError { .. }));
    assert!(!temp_dir.path().join("query_results.csv").exists());
}

#[tokio::test]
async fn test_metric_tool_reports_script_faults() {
    let temp_dir = TempDir::new().unwrap();
    let toolbox = toolbox("http://127.0.0.1:1/graphql".to_string(), &temp_dir);
    std::fs::write(temp_dir.path().join("data.csv"), "id,amountUSD\na,1\n").unwrap();

    let output = toolbox
        .dispatch(ToolCall::Metric {
            dataset: "data.csv".to_string(),
            script: "x = 1 / 0".to_string(),
        })
        .await
        .unwrap();

    let ToolOutput::Metric { outcome } = output else {
        panic!("expected metric output");
    };
    assert_eq!(
        outcome.diagnostic(),
        Some("Failed to run script. Error: line 1: division by zero")
    );
}
