//! GraphQL-over-HTTP client for the subgraph endpoint.

use crate::domain::model::{QueryResult, Record};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AnalysisError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const RETRYABLE_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Deserialize)]
struct GraphQLErrorMessage {
    message: String,
}

pub struct QueryExecutor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl QueryExecutor {
    pub fn new<C: ConfigProvider>(config: &C) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .build()
            .map_err(|e| AnalysisError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.graphql_endpoint().to_string(),
            api_key: config.api_key().map(str::to_string),
            retry_attempts: config.retry_attempts(),
            retry_delay: Duration::from_millis(config.retry_delay_ms()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 執行查詢並取回頂層欄位下的記錄
    pub async fn execute(&self, query: &str) -> Result<QueryResult> {
        tracing::debug!("📡 Sending GraphQL query to {}", self.endpoint);
        let body = self.send_with_retry(query).await?;
        let result = parse_response(body)?;
        tracing::info!(
            "📡 Query returned {} records under '{}'",
            result.records.len(),
            result.root_field
        );
        Ok(result)
    }

    async fn send_with_retry(&self, query: &str) -> Result<Value> {
        let total_attempts = self.retry_attempts + 1;
        let mut last_error = String::new();

        for attempt in 1..=total_attempts {
            if attempt > 1 {
                // 指數退避
                let delay = self.retry_delay * 2u32.saturating_pow(attempt - 2);
                tracing::warn!(
                    "🔁 Retrying GraphQL request ({}/{}) in {:?}: {}",
                    attempt,
                    total_attempts,
                    delay,
                    last_error
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&self.endpoint).json(&json!({ "query": query }));
            if let Some(api_key) = &self.api_key {
                request = request.bearer_auth(api_key);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = format!("transport error: {}", e);
                    continue;
                }
            };

            let status = response.status();
            tracing::debug!("API response status: {}", status);

            if RETRYABLE_STATUSES.contains(&status) {
                last_error = format!("HTTP {}", status);
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| AnalysisError::query(format!("failed to read response body: {}", e)))?;

            let body: Value = serde_json::from_str(&text).map_err(|_| {
                AnalysisError::query(format!("HTTP {}: response is not JSON: {}", status, snippet(&text)))
            })?;

            if !status.is_success() {
                // 4xx 仍可能帶有 GraphQL 錯誤訊息
                if let Some(message) = graphql_errors(&body) {
                    return Err(AnalysisError::query(message));
                }
                return Err(AnalysisError::query(format!(
                    "HTTP {}: {}",
                    status,
                    snippet(&text)
                )));
            }

            return Ok(body);
        }

        Err(AnalysisError::query(format!(
            "giving up after {} attempts, last error: {}",
            total_attempts, last_error
        )))
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

fn graphql_errors(body: &Value) -> Option<String> {
    let errors = body.get("errors")?;
    let parsed: Vec<GraphQLErrorMessage> = serde_json::from_value(errors.clone()).ok()?;
    if parsed.is_empty() {
        return None;
    }
    Some(
        parsed
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// 解析回應：`{"data": {...}}` 或直接以根欄位為鍵的物件
pub fn parse_response(body: Value) -> Result<QueryResult> {
    if let Some(message) = graphql_errors(&body) {
        return Err(AnalysisError::query(message));
    }

    let Value::Object(mut object) = body else {
        return Err(AnalysisError::query("response is not a JSON object"));
    };

    let data = match object.remove("data") {
        Some(Value::Object(data)) => data,
        Some(Value::Null) | None if !object.is_empty() => object,
        _ => return Err(AnalysisError::query("response contains no data")),
    };

    if data.len() > 1 {
        tracing::warn!(
            "Response has {} top-level fields, using the first one",
            data.len()
        );
    }

    let Some((root_field, value)) = data.into_iter().next() else {
        return Err(AnalysisError::query("response contains no top-level field"));
    };

    let records = match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(obj) => Ok(Record::new(obj)),
                other => Err(AnalysisError::query(format!(
                    "expected objects under '{}', found {}",
                    root_field, other
                ))),
            })
            .collect::<Result<Vec<_>>>()?,
        Value::Object(obj) => vec![Record::new(obj)],
        Value::Null => Vec::new(),
        other => {
            return Err(AnalysisError::query(format!(
                "unexpected value under '{}': {}",
                root_field, other
            )))
        }
    };

    Ok(QueryResult {
        root_field,
        records,
    })
}
