//! Sandboxed analysis scripts run by the metric and chart runners.
//!
//! A script is a list of `name = expr` / `expr` statements evaluated against
//! the loaded dataset (bound as `df`). There are no loops, no imports and no
//! I/O besides `print` and the chart functions, and every run is bounded by
//! [`ScriptLimits`].

mod functions;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

use crate::adapters::render::ChartSpec;
use crate::core::dataset::TabularDataset;
use serde_json::{Map, Value};
use std::fmt;

pub use value::ScriptValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// 從 1 起算的行號
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

#[derive(Debug, Clone, Copy)]
pub struct ScriptLimits {
    pub max_statements: usize,
    pub max_output_bytes: usize,
    pub max_charts: usize,
    /// 單一值的大小上限：字串以位元組計，清單與對應表以元素數計（含巢狀）
    pub max_value_len: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_statements: 1000,
            max_output_bytes: 64 * 1024,
            max_charts: 20,
            max_value_len: 4_000_000,
        }
    }
}

/// 腳本要求繪製的一張圖
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub name: String,
    pub spec: ChartSpec,
}

/// 圖表函式的接收端
pub trait ChartSink {
    fn draw(&mut self, request: ChartRequest) -> std::result::Result<(), String>;
}

/// 指標腳本不提供圖表函式
pub struct NoCharts;

impl ChartSink for NoCharts {
    fn draw(&mut self, request: ChartRequest) -> std::result::Result<(), String> {
        Err(format!(
            "chart functions are not available here (tried to draw '{}')",
            request.name
        ))
    }
}

/// 收集所有圖表請求，稍後再統一輸出
#[derive(Debug, Default)]
pub struct CollectCharts {
    pub requests: Vec<ChartRequest>,
}

impl ChartSink for CollectCharts {
    fn draw(&mut self, request: ChartRequest) -> std::result::Result<(), String> {
        if self.requests.iter().any(|r| r.name == request.name) {
            return Err(format!("chart '{}' is drawn twice", request.name));
        }
        self.requests.push(request);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptOutput {
    /// print 的輸出
    pub output: String,
    /// 依首次賦值順序的變數
    pub variables: Map<String, Value>,
}

pub fn run_script(
    source: &str,
    dataset: &TabularDataset,
    sink: &mut dyn ChartSink,
    limits: ScriptLimits,
) -> std::result::Result<ScriptOutput, ScriptError> {
    let statements = parser::parse(lexer::tokenize(source)?)?;
    if let Some(statement) = statements.get(limits.max_statements) {
        return Err(ScriptError::new(
            statement.line,
            format!("script exceeds {} statements", limits.max_statements),
        ));
    }

    let mut interpreter = interpreter::Interpreter::new(dataset, sink, limits);
    for statement in &statements {
        interpreter.execute(statement)?;
    }
    Ok(interpreter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> TabularDataset {
        TabularDataset::from_csv_bytes(
            b"id,pair,amountUSD,timestamp\n\
              a,USDC/WETH,100,1700000000\n\
              b,USDC/WETH,250.5,1700003600\n\
              c,WBTC/WETH,50,1700007200\n\
              d,WBTC/WETH,,1700010800\n",
        )
        .unwrap()
    }

    fn run(source: &str) -> std::result::Result<ScriptOutput, ScriptError> {
        run_script(source, &dataset(), &mut NoCharts, ScriptLimits::default())
    }

    #[test]
    fn test_print_is_verbatim() {
        let result = run("print(\"value=5\")").unwrap();
        assert_eq!(result.output, "value=5\n");
    }

    #[test]
    fn test_metrics_over_columns() {
        let result = run(
            "rows = len(df)\n\
             total = sum(df.amountUSD)\n\
             avg = round(mean(df[\"amountUSD\"]), 2)\n\
             missing = rows - count(df.amountUSD)\n\
             pairs = nunique(df.pair)\n\
             print(\"total:\", total)",
        )
        .unwrap();

        assert_eq!(result.variables["rows"], json!(4));
        assert_eq!(result.variables["total"], json!(400.5));
        assert_eq!(result.variables["avg"], json!(133.5));
        assert_eq!(result.variables["missing"], json!(1));
        assert_eq!(result.variables["pairs"], json!(2));
        assert_eq!(result.output, "total: 400.5\n");
        let names: Vec<&str> = result.variables.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["rows", "total", "avg", "missing", "pairs"]);
    }

    #[test]
    fn test_grouping_and_filtering() {
        let result = run(
            "by_pair = group_sum(df.pair, df.amountUSD)\n\
             big = filter(df.id, df.amountUSD > 90)\n\
             share = df.amountUSD / sum(df.amountUSD) * 100",
        )
        .unwrap();

        assert_eq!(
            result.variables["by_pair"],
            json!({"USDC/WETH": 350.5, "WBTC/WETH": 50})
        );
        assert_eq!(result.variables["big"], json!(["a", "b"]));
        assert_eq!(result.variables["share"][3], json!(null));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = run("x = 1\ny = sum(df.nope)").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("nope"));

        let err = run("x = 1 / 0").unwrap_err();
        assert_eq!(err.to_string(), "line 1: division by zero");

        let err = run("bar(df.pair, df.amountUSD, \"t\", \"c\")").unwrap_err();
        assert!(err.message.contains("not available"));
    }

    #[test]
    fn test_statement_limit() {
        let limits = ScriptLimits {
            max_statements: 2,
            ..ScriptLimits::default()
        };
        let err = run_script("a = 1; b = 2; c = 3", &dataset(), &mut NoCharts, limits)
            .unwrap_err();
        assert!(err.message.contains("exceeds 2 statements"));
    }

    #[test]
    fn test_chart_functions_collect_requests() {
        let mut sink = CollectCharts::default();
        run_script(
            "bar(keys(group_sum(df.pair, df.amountUSD)), values(group_sum(df.pair, df.amountUSD)), \"Volume by pair\", \"volume\")\n\
             hist(df.amountUSD, 4, \"Trade sizes\", \"sizes\")\n\
             line(df.timestamp, cumsum(df.amountUSD))",
            &dataset(),
            &mut sink,
            ScriptLimits::default(),
        )
        .unwrap();

        let names: Vec<&str> = sink.requests.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["volume", "sizes", "chart_3"]);
        assert_eq!(sink.requests[0].spec.points.len(), 2);
        assert_eq!(sink.requests[1].spec.points.len(), 4);
        assert_eq!(sink.requests[2].spec.points.len(), 3);
    }

    #[test]
    fn test_value_size_limit() {
        let mut source = String::from("a = \"xxxxxxxx\"\n");
        for _ in 0..60 {
            source.push_str("a = a + a\n");
        }
        let err = run(&source).unwrap_err();
        assert!(err.message.contains("exceeds 4000000 elements or bytes"));
        assert!(err.line < 30);

        let limits = ScriptLimits {
            max_value_len: 50,
            ..ScriptLimits::default()
        };
        let err = run_script(
            "a = [1, 2, 3]\nb = [a, a, a, a, a, a, a, a, a, a, a, a, a]",
            &dataset(),
            &mut NoCharts,
            limits,
        )
        .unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("exceeds 50"));
    }

    #[test]
    fn test_hist_bins_are_capped() {
        let err = run("h = hist(df.amountUSD, 1e19)").unwrap_err();
        assert!(err.message.contains("hist() bins must be <= 1000"));

        let mut sink = CollectCharts::default();
        run_script("hist(df.amountUSD, 1000)", &dataset(), &mut sink, ScriptLimits::default())
            .unwrap();
        assert_eq!(sink.requests[0].spec.points.len(), 1000);
    }

    #[test]
    fn test_deeply_nested_script_fails_cleanly() {
        let err = run(&format!("x = {}1", "-".repeat(200_000))).unwrap_err();
        assert_eq!(err.line, 1);

        let chain = vec!["df.amountUSD"; 400].join(" + ");
        let err = run(&format!("x = {}", chain)).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }
}
