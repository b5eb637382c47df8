//! Turns a question into an [`AnalysisPlan`]: the GraphQL query plus the
//! metric and chart scripts that go with the detected intent.

use crate::domain::model::{AnalysisPlan, AnalysisRequest, ChartFormat};
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

const TOKEN_SELECTION: &[&str] = &["id", "symbol", "name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Swaps,
    Mints,
    Burns,
    PoolHourData,
    PoolDayData,
    Tokens,
    Pools,
}

/// 每種意圖對應的查詢樣板
struct Template {
    root: &'static str,
    entity: &'static str,
    title: &'static str,
    order_by: &'static str,
    time_field: Option<&'static str>,
    /// 以地址篩選時使用的欄位
    pool_field: Option<&'static str>,
    fields: &'static [&'static str],
    nested: &'static [&'static str],
    metric_script: &'static str,
    chart_script: &'static str,
}

const SWAP_METRICS: &str = r#"swaps = len(df)
volume_usd = round(sum(df.amountUSD), 2)
avg_swap_usd = round(mean(df.amountUSD), 2)
median_swap_usd = round(median(df.amountUSD), 2)
largest_swap_usd = round(max(df.amountUSD), 2)
unique_traders = nunique(df.origin)
print("Swaps analysed: " + str(swaps))
print("Total volume (USD): " + str(volume_usd))
print("Average swap (USD): " + str(avg_swap_usd))
print("Largest swap (USD): " + str(largest_swap_usd))
print("Unique traders: " + str(unique_traders))
"#;

const SWAP_CHARTS: &str = r#"line(date(reverse(df.timestamp)), reverse(df.amountUSD), "Swap size over time (USD)", "swap_volume")
hist(df.amountUSD, 10, "Swap size distribution (USD)", "swap_size_distribution")
"#;

const MINT_METRICS: &str = r#"events = len(df)
liquidity_added_usd = round(sum(df.amountUSD), 2)
avg_deposit_usd = round(mean(df.amountUSD), 2)
largest_deposit_usd = round(max(df.amountUSD), 2)
unique_providers = nunique(df.origin)
print("Liquidity additions: " + str(events))
print("Liquidity added (USD): " + str(liquidity_added_usd))
print("Average deposit (USD): " + str(avg_deposit_usd))
print("Unique providers: " + str(unique_providers))
"#;

const MINT_CHARTS: &str = r#"bar(date(reverse(df.timestamp)), reverse(df.amountUSD), "Liquidity added (USD)", "liquidity_added")
hist(df.amountUSD, 10, "Deposit size distribution (USD)", "deposit_size_distribution")
"#;

const BURN_METRICS: &str = r#"events = len(df)
liquidity_removed_usd = round(sum(df.amountUSD), 2)
avg_withdrawal_usd = round(mean(df.amountUSD), 2)
largest_withdrawal_usd = round(max(df.amountUSD), 2)
unique_providers = nunique(df.origin)
print("Liquidity removals: " + str(events))
print("Liquidity removed (USD): " + str(liquidity_removed_usd))
print("Average withdrawal (USD): " + str(avg_withdrawal_usd))
print("Unique providers: " + str(unique_providers))
"#;

const BURN_CHARTS: &str = r#"bar(date(reverse(df.timestamp)), reverse(df.amountUSD), "Liquidity removed (USD)", "liquidity_removed")
hist(df.amountUSD, 10, "Withdrawal size distribution (USD)", "withdrawal_size_distribution")
"#;

const HOUR_METRICS: &str = r#"hours = len(df)
total_volume_usd = round(sum(df.volumeUSD), 2)
avg_hourly_volume_usd = round(mean(df.volumeUSD), 2)
total_fees_usd = round(sum(df.feesUSD), 2)
latest_tvl_usd = round(first(df.tvlUSD), 2)
peak_tvl_usd = round(max(df.tvlUSD), 2)
low_tvl_usd = round(min(df.tvlUSD), 2)
print("Hours covered: " + str(hours))
print("Total volume (USD): " + str(total_volume_usd))
print("Fees earned (USD): " + str(total_fees_usd))
print("Latest TVL (USD): " + str(latest_tvl_usd))
"#;

const HOUR_CHARTS: &str = r#"line(date(reverse(df.periodStartUnix)), reverse(df.tvlUSD), "TVL by hour (USD)", "hourly_tvl")
bar(date(reverse(df.periodStartUnix)), reverse(df.volumeUSD), "Volume by hour (USD)", "hourly_volume")
"#;

const DAY_METRICS: &str = r#"days = len(df)
total_volume_usd = round(sum(df.volumeUSD), 2)
avg_daily_volume_usd = round(mean(df.volumeUSD), 2)
total_fees_usd = round(sum(df.feesUSD), 2)
latest_tvl_usd = round(first(df.tvlUSD), 2)
peak_tvl_usd = round(max(df.tvlUSD), 2)
low_tvl_usd = round(min(df.tvlUSD), 2)
tvl_volatility_usd = round(std(df.tvlUSD), 2)
print("Days covered: " + str(days))
print("Total volume (USD): " + str(total_volume_usd))
print("Average daily volume (USD): " + str(avg_daily_volume_usd))
print("Fees earned (USD): " + str(total_fees_usd))
print("Latest TVL (USD): " + str(latest_tvl_usd))
"#;

const DAY_CHARTS: &str = r#"line(date(reverse(df.date)), reverse(df.tvlUSD), "TVL by day (USD)", "daily_tvl")
bar(date(reverse(df.date)), reverse(df.volumeUSD), "Volume by day (USD)", "daily_volume")
"#;

const TOKEN_METRICS: &str = r#"tokens = len(df)
total_tvl_usd = round(sum(df.totalValueLockedUSD), 2)
total_volume_usd = round(sum(df.volumeUSD), 2)
tvl_by_token = top(group_sum(df.symbol, df.totalValueLockedUSD), 10)
print("Tokens analysed: " + str(tokens))
print("Combined TVL (USD): " + str(total_tvl_usd))
print(table(tvl_by_token))
"#;

const TOKEN_CHARTS: &str = r#"tvl_by_token = top(group_sum(df.symbol, df.totalValueLockedUSD), 10)
bar(keys(tvl_by_token), values(tvl_by_token), "TVL by token (USD)", "tvl_by_token")
scatter(df.totalValueLockedUSD, df.volumeUSD, "Volume vs TVL (USD)", "token_volume_vs_tvl")
"#;

const POOL_METRICS: &str = r#"pools = len(df)
total_tvl_usd = round(sum(df.totalValueLockedUSD), 2)
total_volume_usd = round(sum(df.volumeUSD), 2)
avg_tvl_usd = round(mean(df.totalValueLockedUSD), 2)
pair = df.token0_symbol + "/" + df.token1_symbol
tvl_by_pair = top(group_sum(pair, df.totalValueLockedUSD), 10)
print("Pools analysed: " + str(pools))
print("Combined TVL (USD): " + str(total_tvl_usd))
print("Combined volume (USD): " + str(total_volume_usd))
print(table(tvl_by_pair))
"#;

const POOL_CHARTS: &str = r#"pair = df.token0_symbol + "/" + df.token1_symbol
tvl_by_pair = top(group_sum(pair, df.totalValueLockedUSD), 10)
bar(keys(tvl_by_pair), values(tvl_by_pair), "TVL by pair (USD)", "tvl_by_pair")
scatter(df.totalValueLockedUSD, df.volumeUSD, "Volume vs TVL (USD)", "pool_volume_vs_tvl")
"#;

impl Intent {
    /// 第一個符合的關鍵字決定意圖
    pub fn detect(question: &str) -> Self {
        let text = question.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if has(&["swap", "trade"]) {
            Intent::Swaps
        } else if has(&["mint", "add liquidity", "deposit"]) {
            Intent::Mints
        } else if has(&["burn", "remove liquidity", "withdraw"]) {
            Intent::Burns
        } else if has(&["hour"]) {
            Intent::PoolHourData
        } else if has(&["daily", "day", "history", "trend", "over time"]) {
            Intent::PoolDayData
        } else if has(&["token"]) && !has(&["pool"]) {
            Intent::Tokens
        } else {
            Intent::Pools
        }
    }

    fn template(&self) -> Template {
        const EVENT_FIELDS: &[&str] = &["id", "timestamp", "amount0", "amount1", "amountUSD", "origin"];
        match self {
            Intent::Swaps => Template {
                root: "swaps",
                entity: "Swap",
                title: "Swap Activity Report",
                order_by: "timestamp",
                time_field: Some("timestamp"),
                pool_field: Some("pool"),
                fields: &["id", "timestamp", "amount0", "amount1", "amountUSD", "sender", "recipient", "origin"],
                nested: &["token0", "token1"],
                metric_script: SWAP_METRICS,
                chart_script: SWAP_CHARTS,
            },
            Intent::Mints => Template {
                root: "mints",
                entity: "Mint",
                title: "Liquidity Additions Report",
                order_by: "timestamp",
                time_field: Some("timestamp"),
                pool_field: Some("pool"),
                fields: EVENT_FIELDS,
                nested: &["token0", "token1"],
                metric_script: MINT_METRICS,
                chart_script: MINT_CHARTS,
            },
            Intent::Burns => Template {
                root: "burns",
                entity: "Burn",
                title: "Liquidity Removals Report",
                order_by: "timestamp",
                time_field: Some("timestamp"),
                pool_field: Some("pool"),
                fields: EVENT_FIELDS,
                nested: &["token0", "token1"],
                metric_script: BURN_METRICS,
                chart_script: BURN_CHARTS,
            },
            Intent::PoolHourData => Template {
                root: "poolHourDatas",
                entity: "PoolHourData",
                title: "Hourly Pool Liquidity Report",
                order_by: "periodStartUnix",
                time_field: Some("periodStartUnix"),
                pool_field: Some("pool"),
                fields: &["id", "periodStartUnix", "liquidity", "tvlUSD", "volumeUSD", "feesUSD", "txCount", "token0Price", "token1Price"],
                nested: &[],
                metric_script: HOUR_METRICS,
                chart_script: HOUR_CHARTS,
            },
            Intent::PoolDayData => Template {
                root: "poolDayDatas",
                entity: "PoolDayData",
                title: "Daily Pool Liquidity Report",
                order_by: "date",
                time_field: Some("date"),
                pool_field: Some("pool"),
                fields: &["id", "date", "liquidity", "tvlUSD", "volumeUSD", "feesUSD", "txCount", "token0Price", "token1Price"],
                nested: &[],
                metric_script: DAY_METRICS,
                chart_script: DAY_CHARTS,
            },
            Intent::Tokens => Template {
                root: "tokens",
                entity: "Token",
                title: "Token Liquidity Report",
                order_by: "totalValueLockedUSD",
                time_field: None,
                pool_field: None,
                fields: &["id", "symbol", "name", "decimals", "volumeUSD", "totalValueLockedUSD", "txCount"],
                nested: &[],
                metric_script: TOKEN_METRICS,
                chart_script: TOKEN_CHARTS,
            },
            Intent::Pools => Template {
                root: "pools",
                entity: "Pool",
                title: "Pool Liquidity Report",
                order_by: "totalValueLockedUSD",
                time_field: None,
                pool_field: Some("id"),
                fields: &["id", "feeTier", "liquidity", "token0Price", "token1Price", "volumeUSD", "totalValueLockedUSD", "txCount"],
                nested: &["token0", "token1"],
                metric_script: POOL_METRICS,
                chart_script: POOL_CHARTS,
            },
        }
    }
}

/// 從 SDL 解析出的實體與欄位
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    entities: HashMap<String, Vec<String>>,
}

impl SchemaCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_sdl(&content)
    }

    /// 只解析 `type X @entity { ... }` 區塊
    pub fn from_sdl(sdl: &str) -> Result<Self> {
        let block = Regex::new(r"type\s+(\w+)\s+@entity[^{]*\{([^}]*)\}").map_err(|e| {
            AnalysisError::PlanningError {
                message: format!("Invalid schema pattern: {}", e),
            }
        })?;
        let field = Regex::new(r"^\s*(\w+)\s*(?:\([^)]*\))?\s*:").map_err(|e| {
            AnalysisError::PlanningError {
                message: format!("Invalid field pattern: {}", e),
            }
        })?;

        let mut entities = HashMap::new();
        for captures in block.captures_iter(sdl) {
            let fields = captures[2]
                .lines()
                .filter_map(|line| field.captures(line).map(|c| c[1].to_string()))
                .collect();
            entities.insert(captures[1].to_string(), fields);
        }

        if entities.is_empty() {
            return Err(AnalysisError::PlanningError {
                message: "Schema defines no @entity types".to_string(),
            });
        }
        tracing::debug!("Schema catalog loaded with {} entities", entities.len());
        Ok(Self { entities })
    }

    pub fn fields(&self, entity: &str) -> Option<&[String]> {
        self.entities.get(entity).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordPlanner {
    catalog: Option<SchemaCatalog>,
}

impl KeywordPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn plan(&self, request: &AnalysisRequest) -> Result<AnalysisPlan> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AnalysisError::PlanningError {
                message: "The question is empty".to_string(),
            });
        }
        if let (Some(start), Some(end)) = (request.start_time, request.end_time) {
            if start > end {
                return Err(AnalysisError::PlanningError {
                    message: format!("start time {} is after end time {}", start, end),
                });
            }
        }

        // 位址會直接寫進查詢字串
        if let Some(address) = &request.pool_address {
            validation::validate_address("pool_address", address).map_err(|e| {
                AnalysisError::PlanningError {
                    message: e.to_string(),
                }
            })?;
        }

        let intent = Intent::detect(question);
        let template = intent.template();
        let limit = extract_limit(question);
        let pool = request
            .pool_address
            .as_deref()
            .map(str::to_lowercase)
            .or_else(|| extract_address(question));

        let (fields, nested, time_field) = self.resolve_fields(&template)?;
        let query = build_query(
            &template,
            &fields,
            &nested,
            time_field,
            limit,
            pool.as_deref(),
            request,
        );

        let title = match &pool {
            Some(address) if template.pool_field.is_some() => {
                format!("{} for {}", template.title, short_address(address))
            }
            _ => template.title.to_string(),
        };

        tracing::info!("🧭 Planned {:?} query (first: {})", intent, limit);
        Ok(AnalysisPlan {
            title,
            question: question.to_string(),
            query,
            metric_script: template.metric_script.to_string(),
            chart_script: template.chart_script.to_string(),
            chart_types: ChartFormat::all(),
            report_name: request.report_name.clone(),
        })
    }

    /// 有 schema 時檢查實體存在，並移除不存在的欄位
    fn resolve_fields(
        &self,
        template: &Template,
    ) -> Result<(Vec<&'static str>, Vec<&'static str>, Option<&'static str>)> {
        let Some(catalog) = &self.catalog else {
            return Ok((
                template.fields.to_vec(),
                template.nested.to_vec(),
                template.time_field,
            ));
        };

        let known = catalog
            .fields(template.entity)
            .ok_or_else(|| AnalysisError::PlanningError {
                message: format!("Schema has no '{}' entity", template.entity),
            })?;
        let exists = |name: &str| known.iter().any(|f| f == name);

        let keep = |names: &[&'static str]| -> Vec<&'static str> {
            names
                .iter()
                .copied()
                .filter(|name| {
                    let found = exists(*name);
                    if !found {
                        tracing::warn!(
                            "⚠️ Field '{}' is not defined on {}, dropping it",
                            name,
                            template.entity
                        );
                    }
                    found
                })
                .collect()
        };

        let fields = keep(template.fields);
        let nested = keep(template.nested);
        let time_field = template.time_field.filter(|f| exists(*f));
        Ok((fields, nested, time_field))
    }
}

fn build_query(
    template: &Template,
    fields: &[&str],
    nested: &[&str],
    time_field: Option<&str>,
    limit: usize,
    pool: Option<&str>,
    request: &AnalysisRequest,
) -> String {
    let mut filters = Vec::new();
    if let (Some(field), Some(address)) = (template.pool_field, pool) {
        filters.push(format!("{}: \"{}\"", field, address));
    }
    if let Some(field) = time_field {
        if let Some(start) = request.start_time {
            filters.push(format!("{}_gte: {}", field, start));
        }
        if let Some(end) = request.end_time {
            filters.push(format!("{}_lte: {}", field, end));
        }
    }

    let mut arguments = vec![
        format!("first: {}", limit),
        format!("orderBy: {}", template.order_by),
        "orderDirection: desc".to_string(),
    ];
    if !filters.is_empty() {
        arguments.push(format!("where: {{ {} }}", filters.join(", ")));
    }

    let mut query = format!("{{\n  {}({}) {{\n", template.root, arguments.join(", "));
    for field in fields {
        query.push_str(&format!("    {}\n", field));
    }
    for key in nested {
        query.push_str(&format!("    {} {{ {} }}\n", key, TOKEN_SELECTION.join(" ")));
    }
    query.push_str("  }\n}\n");
    query
}

/// `top 20`、`first 5`、`last 50`
pub fn extract_limit(question: &str) -> usize {
    let Ok(pattern) = Regex::new(r"(?i)\b(?:top|first|last)\s+(\d+)") else {
        return DEFAULT_LIMIT;
    };
    pattern
        .captures(question)
        .and_then(|c| c[1].parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_LIMIT))
        .unwrap_or(DEFAULT_LIMIT)
}

pub fn extract_address(question: &str) -> Option<String> {
    let pattern = Regex::new(r"0x[0-9a-fA-F]{40}").ok()?;
    pattern
        .find(question)
        .map(|m| m.as_str().to_lowercase())
}

fn short_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}
