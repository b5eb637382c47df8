use httpmock::prelude::*;
use liquidity_etl::domain::model::{AnalysisPlan, AnalysisRequest, ChartFormat, MetricOutcome};
use liquidity_etl::{
    AnalysisEngine, AnalysisError, AnalysisPipeline, AppConfig, KeywordPlanner, LocalStorage,
};
use std::path::Path;
use tempfile::TempDir;

fn swaps_body() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "swaps": [
                {
                    "id": "0xaa-1",
                    "timestamp": "1700003600",
                    "amountUSD": "1500.25",
                    "origin": "0x1111111111111111111111111111111111111111",
                    "token0": {"id": "0xa0b8", "symbol": "USDC", "name": "USD Coin"},
                    "token1": {"id": "0xc02a", "symbol": "WETH", "name": "Wrapped Ether"}
                },
                {
                    "id": "0xaa-2",
                    "timestamp": "1700000000",
                    "amountUSD": "320.5",
                    "origin": "0x2222222222222222222222222222222222222222",
                    "token0": {"id": "0xa0b8", "symbol": "USDC", "name": "USD Coin"},
                    "token1": {"id": "0xc02a", "symbol": "WETH"}
                }
            ]
        }
    })
}

fn config(endpoint: String, output_path: &str) -> AppConfig {
    let mut config = AppConfig::new(endpoint);
    config.output_path = output_path.to_string();
    config.retry_attempts = 1;
    config.retry_delay_ms = 1;
    config.timeout_seconds = 5;
    config
}

#[tokio::test]
async fn test_end_to_end_analysis_with_real_http() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/subgraphs/uniswap")
            .body_contains("swaps(first: 2");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(swaps_body());
    });

    let mut request = AnalysisRequest::new("top 2 swaps");
    request.report_name = Some("swap report".to_string());
    let plan = KeywordPlanner::new().plan(&request).unwrap();

    let mut config = config(server.url("/subgraphs/uniswap"), &output_path);
    config.bundle_artifacts = true;
    let storage = LocalStorage::new(output_path.clone());
    let pipeline = AnalysisPipeline::new(storage, config)
        .unwrap()
        .with_run_dir("run");
    let engine = AnalysisEngine::new(pipeline);

    let response = engine.run(&plan).await.unwrap();
    api_mock.assert();

    // CSV 已攤平巢狀欄位
    let csv_path = temp_dir.path().join("run/query_results.csv");
    assert_eq!(response.csv_path, csv_path.to_string_lossy());
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(
        header,
        "id,timestamp,amountUSD,origin,token0_id,token0_symbol,token0_name,token1_id,token1_symbol,token1_name"
    );
    assert_eq!(csv.lines().count(), 3);

    assert!(Path::new(&response.markdown_path).exists());
    assert!(Path::new(&response.pdf_path).exists());
    assert!(response.markdown_report.contains("## Query"));
    // 數字字串欄位在讀回後計入摘要
    assert!(response.markdown_report.contains("### Summary statistics"));
    assert!(response.markdown_report.contains("| amountUSD"));
    assert!(Path::new(response.bundle_path.as_deref().unwrap()).exists());
    assert!(response.markdown_path.contains("swap_report_"));
}

#[tokio::test]
async fn test_chart_script_returns_exactly_the_written_files() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(swaps_body());
    });

    let plan = AnalysisPlan {
        title: "Swaps".to_string(),
        question: "swap sizes".to_string(),
        query: "{ swaps(first: 2) { id amountUSD } }".to_string(),
        metric_script: "print(\"value=5\")".to_string(),
        chart_script: "bar(df.id, df.amountUSD, \"Swap size\", \"chart\")".to_string(),
        chart_types: ChartFormat::all(),
        report_name: None,
    };

    let storage = LocalStorage::new(output_path.clone());
    let pipeline = AnalysisPipeline::new(storage, config(server.url("/graphql"), &output_path))
        .unwrap()
        .with_run_dir("run");
    let response = AnalysisEngine::new(pipeline).run(&plan).await.unwrap();

    let run_dir = temp_dir.path().join("run");
    assert_eq!(
        response.html_paths,
        vec![run_dir.join("chart.html").to_string_lossy().to_string()]
    );
    assert_eq!(
        response.png_paths,
        vec![run_dir.join("chart.png").to_string_lossy().to_string()]
    );

    let MetricOutcome::Completed(metrics) = &response.metrics else {
        panic!("expected completed metrics");
    };
    assert!(metrics.output.contains("value=5"));
    assert!(response.markdown_report.contains("value=5"));
    assert!(response.bundle_path.is_none());
}

#[tokio::test]
async fn test_empty_result_is_no_data_and_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(serde_json::json!({"data": {"swaps": []}}));
    });

    let plan = KeywordPlanner::new()
        .plan(&AnalysisRequest::new("recent swaps"))
        .unwrap();
    let storage = LocalStorage::new(output_path.clone());
    let pipeline = AnalysisPipeline::new(storage, config(server.url("/graphql"), &output_path))
        .unwrap()
        .with_run_dir("run");

    let err = AnalysisEngine::new(pipeline).run(&plan).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NoDataError { ref root_field } if root_field == "swaps"));
    assert!(!temp_dir.path().join("run").exists());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(503);
    });

    let plan = KeywordPlanner::new()
        .plan(&AnalysisRequest::new("largest pools"))
        .unwrap();
    let storage = LocalStorage::new(output_path.clone());
    let pipeline = AnalysisPipeline::new(storage, config(server.url("/graphql"), &output_path))
        .unwrap()
        .with_run_dir("run");

    let err = AnalysisEngine::new(pipeline).run(&plan).await.unwrap_err();
    assert!(matches!(err, AnalysisError::QueryError { .. }));
    api_mock.assert_hits(2);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_query_error() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let plan = KeywordPlanner::new()
        .plan(&AnalysisRequest::new("largest pools"))
        .unwrap();
    let storage = LocalStorage::new(output_path.clone());
    let pipeline = AnalysisPipeline::new(
        storage,
        config("http://127.0.0.1:1/graphql".to_string(), &output_path),
    )
    .unwrap();

    let err = AnalysisEngine::new(pipeline).run(&plan).await.unwrap_err();
    assert!(matches!(err, AnalysisError::QueryError { .. }));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_graphql_errors_abort_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(serde_json::json!({
            "errors": [{"message": "Type `Query` has no field `swapz`"}]
        }));
    });

    let plan = KeywordPlanner::new()
        .plan(&AnalysisRequest::new("recent swaps"))
        .unwrap();
    let storage = LocalStorage::new(output_path.clone());
    let pipeline =
        AnalysisPipeline::new(storage, config(server.url("/graphql"), &output_path)).unwrap();

    let err = AnalysisEngine::new(pipeline).run(&plan).await.unwrap_err();
    assert!(err.to_string().contains("swapz"));
}
