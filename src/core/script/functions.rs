use super::interpreter::{filter, map_elements, EvalResult, Interpreter};
use super::value::{compare, format_number, ScriptValue};
use super::ChartRequest;
use crate::adapters::render::{format_tick, ChartKind, ChartPoint, ChartSpec};
use crate::core::dataset::describe_values;
use crate::core::stats;
use chrono::DateTime;
use tabled::builder::Builder;
use tabled::settings::Style;

const DEFAULT_HEAD: usize = 5;
const DEFAULT_BINS: usize = 10;
const MAX_HIST_BINS: usize = 1000;

fn arity(name: &str, args: &[ScriptValue], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(format!(
            "{}() takes {} arguments, got {}",
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn list_arg<'v>(name: &str, value: &'v ScriptValue) -> Result<&'v [ScriptValue], String> {
    match value {
        ScriptValue::List(items) => Ok(items),
        other => Err(format!("{}() expects a list, got {}", name, other.type_name())),
    }
}

fn map_arg<'v>(name: &str, value: &'v ScriptValue) -> Result<&'v [(String, ScriptValue)], String> {
    match value {
        ScriptValue::Map(entries) => Ok(entries),
        other => Err(format!("{}() expects a map, got {}", name, other.type_name())),
    }
}

fn count_arg(name: &str, args: &[ScriptValue], position: usize, default: usize) -> Result<usize, String> {
    match args.get(position) {
        None => Ok(default),
        Some(ScriptValue::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        Some(other) => Err(format!(
            "{}() expects a non-negative whole number, got {}",
            name, other
        )),
    }
}

fn text_arg(args: &[ScriptValue], position: usize) -> Option<String> {
    match args.get(position) {
        Some(ScriptValue::Null) | None => None,
        Some(value) => Some(value.to_string()),
    }
}

/// 取出清單中的數值，略過 null
fn numbers(name: &str, items: &[ScriptValue]) -> Result<Vec<f64>, String> {
    items
        .iter()
        .filter(|v| **v != ScriptValue::Null)
        .map(|v| {
            v.as_number()
                .ok_or_else(|| format!("{}() expects numbers, found {} '{}'", name, v.type_name(), v))
        })
        .collect()
}

fn optional(value: Option<f64>) -> ScriptValue {
    value.map(ScriptValue::Number).unwrap_or(ScriptValue::Null)
}

fn same_length(name: &str, a: &[ScriptValue], b: &[ScriptValue]) -> Result<(), String> {
    if a.len() != b.len() {
        return Err(format!(
            "{}() needs lists of equal length, got {} and {}",
            name,
            a.len(),
            b.len()
        ));
    }
    Ok(())
}

fn unique(items: &[ScriptValue]) -> Vec<ScriptValue> {
    let mut seen: Vec<String> = Vec::new();
    let mut result = Vec::new();
    for item in items {
        let key = item.key();
        if !seen.contains(&key) {
            seen.push(key);
            result.push(item.clone());
        }
    }
    result
}

/// 依鍵分組，保留首次出現順序
fn group(keys: &[ScriptValue], values: &[ScriptValue]) -> Vec<(String, Vec<ScriptValue>)> {
    let mut groups: Vec<(String, Vec<ScriptValue>)> = Vec::new();
    for (key, value) in keys.iter().zip(values) {
        let key = key.key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(value.clone()),
            None => groups.push((key, vec![value.clone()])),
        }
    }
    groups
}

fn format_date(value: &ScriptValue) -> EvalResult {
    let Some(seconds) = value.as_number() else {
        return Ok(ScriptValue::Null);
    };
    let Some(datetime) = DateTime::from_timestamp(seconds as i64, 0) else {
        return Err(format!("{} is not a valid unix timestamp", format_number(seconds)));
    };
    let pattern = if (seconds as i64) % 86_400 == 0 {
        "%Y-%m-%d"
    } else {
        "%Y-%m-%d %H:%M"
    };
    Ok(ScriptValue::Str(datetime.format(pattern).to_string()))
}

fn markdown_table(rows: Vec<Vec<String>>) -> String {
    let mut builder = Builder::default();
    for row in rows {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

/// `table(map)`、`table(list_of_maps)` 或 `table(keys, values)`
fn table(args: &[ScriptValue]) -> EvalResult {
    let rows = match args {
        [ScriptValue::List(keys), ScriptValue::List(values)] => {
            same_length("table", keys, values)?;
            let mut rows = vec![vec!["name".to_string(), "value".to_string()]];
            rows.extend(
                keys.iter()
                    .zip(values)
                    .map(|(k, v)| vec![k.to_string(), v.to_string()]),
            );
            rows
        }
        [ScriptValue::List(records)] => {
            let mut columns: Vec<String> = Vec::new();
            for record in records {
                for (key, _) in map_arg("table", record)? {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
            let mut rows = vec![columns.clone()];
            for record in records {
                rows.push(
                    columns
                        .iter()
                        .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default())
                        .collect(),
                );
            }
            rows
        }
        [ScriptValue::Map(entries)] => {
            let nested = !entries.is_empty()
                && entries.iter().all(|(_, v)| matches!(v, ScriptValue::Map(_)));
            if nested {
                let mut columns: Vec<String> = Vec::new();
                for (_, inner) in entries {
                    for (key, _) in map_arg("table", inner)? {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                let mut header = vec![String::new()];
                header.extend(columns.iter().cloned());
                let mut rows = vec![header];
                for (name, inner) in entries {
                    let mut row = vec![name.clone()];
                    row.extend(
                        columns
                            .iter()
                            .map(|c| inner.get(c).map(|v| v.to_string()).unwrap_or_default()),
                    );
                    rows.push(row);
                }
                rows
            } else {
                let mut rows = vec![vec!["name".to_string(), "value".to_string()]];
                rows.extend(
                    entries
                        .iter()
                        .map(|(k, v)| vec![k.clone(), v.to_string()]),
                );
                rows
            }
        }
        _ => return Err("table() expects a map, a list of maps, or two lists".to_string()),
    };
    Ok(ScriptValue::Str(markdown_table(rows)))
}

fn histogram(values: &[f64], bins: usize) -> Vec<ChartPoint> {
    let (Some(low), Some(high)) = (stats::min(values), stats::max(values)) else {
        return Vec::new();
    };
    let bins = if high > low { bins.max(1) } else { 1 };
    let width = if high > low {
        (high - low) / bins as f64
    } else {
        1.0
    };

    let mut counts = vec![0usize; bins];
    for value in values {
        let slot = (((value - low) / width) as usize).min(bins - 1);
        counts[slot] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let start = low + width * i as f64;
            ChartPoint {
                label: format!("{}-{}", format_tick(start), format_tick(start + width)),
                x: i as f64,
                y: count as f64,
            }
        })
        .collect()
}

impl Interpreter<'_> {
    pub(super) fn call(&mut self, name: &str, args: Vec<ScriptValue>) -> EvalResult {
        match name {
            "print" => self.print(&args),
            "len" => {
                arity(name, &args, 1, 1)?;
                let length = match &args[0] {
                    ScriptValue::Frame => self.dataset.len(),
                    ScriptValue::List(items) => items.len(),
                    ScriptValue::Map(entries) => entries.len(),
                    ScriptValue::Str(s) => s.chars().count(),
                    other => return Err(format!("len() of {} is undefined", other.type_name())),
                };
                Ok(ScriptValue::Number(length as f64))
            }
            "columns" => {
                arity(name, &args, 1, 1)?;
                if args[0] != ScriptValue::Frame {
                    return Err("columns() expects df".to_string());
                }
                Ok(ScriptValue::List(
                    self.dataset
                        .columns
                        .iter()
                        .map(|c| ScriptValue::Str(c.clone()))
                        .collect(),
                ))
            }
            "count" => {
                arity(name, &args, 1, 1)?;
                let items = list_arg(name, &args[0])?;
                let count = items.iter().filter(|v| **v != ScriptValue::Null).count();
                Ok(ScriptValue::Number(count as f64))
            }
            "sum" | "mean" | "median" | "std" | "min" | "max" => {
                if args.is_empty() {
                    return Err(format!("{}() takes at least 1 argument", name));
                }
                let values = if args.len() == 1 {
                    numbers(name, list_arg(name, &args[0])?)?
                } else {
                    numbers(name, &args)?
                };
                Ok(match name {
                    "sum" => ScriptValue::Number(stats::sum(&values)),
                    "mean" => optional(stats::mean(&values)),
                    "median" => optional(stats::median(&values)),
                    "std" => optional(stats::std_dev(&values)),
                    "min" => optional(stats::min(&values)),
                    _ => optional(stats::max(&values)),
                })
            }
            "nunique" => {
                arity(name, &args, 1, 1)?;
                let items = list_arg(name, &args[0])?;
                let non_null: Vec<ScriptValue> = items
                    .iter()
                    .filter(|v| **v != ScriptValue::Null)
                    .cloned()
                    .collect();
                Ok(ScriptValue::Number(unique(&non_null).len() as f64))
            }
            "unique" => {
                arity(name, &args, 1, 1)?;
                Ok(ScriptValue::List(unique(list_arg(name, &args[0])?)))
            }
            "first" | "last" => {
                arity(name, &args, 1, 1)?;
                let items = list_arg(name, &args[0])?;
                let item = if name == "first" {
                    items.first()
                } else {
                    items.last()
                };
                Ok(item.cloned().unwrap_or(ScriptValue::Null))
            }
            "sort" | "sort_desc" => {
                arity(name, &args, 1, 1)?;
                let mut items = list_arg(name, &args[0])?.to_vec();
                items.sort_by(compare);
                if name == "sort_desc" {
                    // null 仍排最後
                    let nulls = items.iter().filter(|v| **v == ScriptValue::Null).count();
                    let cut = items.len() - nulls;
                    items[..cut].reverse();
                }
                Ok(ScriptValue::List(items))
            }
            "reverse" => {
                arity(name, &args, 1, 1)?;
                let mut items = list_arg(name, &args[0])?.to_vec();
                items.reverse();
                Ok(ScriptValue::List(items))
            }
            "head" | "tail" => {
                arity(name, &args, 1, 2)?;
                let n = count_arg(name, &args, 1, DEFAULT_HEAD)?;
                let items = list_arg(name, &args[0])?;
                let n = n.min(items.len());
                let slice = if name == "head" {
                    &items[..n]
                } else {
                    &items[items.len() - n..]
                };
                Ok(ScriptValue::List(slice.to_vec()))
            }
            "abs" => {
                arity(name, &args, 1, 1)?;
                map_elements(args[0].clone(), &|v| match v {
                    ScriptValue::Null => Ok(ScriptValue::Null),
                    v => v
                        .as_number()
                        .map(|n| ScriptValue::Number(n.abs()))
                        .ok_or_else(|| format!("abs() expects numbers, found '{}'", v)),
                })
            }
            "round" => {
                arity(name, &args, 1, 2)?;
                let digits = count_arg(name, &args, 1, 0)? as i32;
                let factor = 10f64.powi(digits);
                map_elements(args[0].clone(), &|v| match v {
                    ScriptValue::Null => Ok(ScriptValue::Null),
                    v => v
                        .as_number()
                        .map(|n| ScriptValue::Number((n * factor).round() / factor))
                        .ok_or_else(|| format!("round() expects numbers, found '{}'", v)),
                })
            }
            "num" => {
                arity(name, &args, 1, 1)?;
                map_elements(args[0].clone(), &|v| {
                    Ok(v.as_number()
                        .map(ScriptValue::Number)
                        .unwrap_or(ScriptValue::Null))
                })
            }
            "str" => {
                arity(name, &args, 1, 1)?;
                map_elements(args[0].clone(), &|v| Ok(ScriptValue::Str(v.to_string())))
            }
            "date" => {
                arity(name, &args, 1, 1)?;
                map_elements(args[0].clone(), &format_date)
            }
            "cumsum" => {
                arity(name, &args, 1, 1)?;
                let mut running = 0.0;
                let items = list_arg(name, &args[0])?;
                let mut result = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_number() {
                        Some(n) => {
                            running += n;
                            result.push(ScriptValue::Number(running));
                        }
                        None => result.push(ScriptValue::Null),
                    }
                }
                Ok(ScriptValue::List(result))
            }
            "diff" | "pct_change" => {
                arity(name, &args, 1, 1)?;
                let items = list_arg(name, &args[0])?;
                let mut result = vec![ScriptValue::Null; items.len().min(1)];
                for pair in items.windows(2) {
                    let change = match (pair[0].as_number(), pair[1].as_number()) {
                        (Some(prev), Some(current)) if name == "diff" => Some(current - prev),
                        (Some(prev), Some(current)) if prev != 0.0 => {
                            Some((current - prev) / prev)
                        }
                        _ => None,
                    };
                    result.push(optional(change));
                }
                Ok(ScriptValue::List(result))
            }
            "filter" => {
                arity(name, &args, 2, 2)?;
                let items = list_arg(name, &args[0])?.to_vec();
                let mask = list_arg(name, &args[1])?.to_vec();
                filter(items, mask)
            }
            "group_sum" | "group_mean" => {
                arity(name, &args, 2, 2)?;
                let keys = list_arg(name, &args[0])?;
                let values = list_arg(name, &args[1])?;
                same_length(name, keys, values)?;
                let mut entries = Vec::new();
                for (key, members) in group(keys, values) {
                    let members = numbers(name, &members)?;
                    let value = if name == "group_sum" {
                        ScriptValue::Number(stats::sum(&members))
                    } else {
                        optional(stats::mean(&members))
                    };
                    entries.push((key, value));
                }
                Ok(ScriptValue::Map(entries))
            }
            "group_count" => {
                arity(name, &args, 1, 1)?;
                let keys = list_arg(name, &args[0])?;
                Ok(ScriptValue::Map(
                    group(keys, keys)
                        .into_iter()
                        .map(|(key, members)| (key, ScriptValue::Number(members.len() as f64)))
                        .collect(),
                ))
            }
            "keys" => {
                arity(name, &args, 1, 1)?;
                Ok(ScriptValue::List(
                    map_arg(name, &args[0])?
                        .iter()
                        .map(|(k, _)| ScriptValue::Str(k.clone()))
                        .collect(),
                ))
            }
            "values" => {
                arity(name, &args, 1, 1)?;
                Ok(ScriptValue::List(
                    map_arg(name, &args[0])?
                        .iter()
                        .map(|(_, v)| v.clone())
                        .collect(),
                ))
            }
            "top" => {
                arity(name, &args, 1, 2)?;
                let n = count_arg(name, &args, 1, DEFAULT_HEAD)?;
                match &args[0] {
                    ScriptValue::Map(entries) => {
                        let mut entries = entries.clone();
                        entries.sort_by(|(_, a), (_, b)| match (a, b) {
                            (ScriptValue::Null, _) | (_, ScriptValue::Null) => compare(a, b),
                            _ => compare(b, a),
                        });
                        entries.truncate(n);
                        Ok(ScriptValue::Map(entries))
                    }
                    ScriptValue::List(_) => {
                        let sorted = self.call("sort_desc", vec![args[0].clone()])?;
                        self.call("head", vec![sorted, ScriptValue::Number(n as f64)])
                    }
                    other => Err(format!("top() expects a map or list, got {}", other.type_name())),
                }
            }
            "describe" => {
                arity(name, &args, 1, 1)?;
                match &args[0] {
                    ScriptValue::Frame => Ok(ScriptValue::from_json(
                        &serde_json::Value::Object(self.dataset.describe()),
                    )),
                    value => {
                        let values = numbers(name, list_arg(name, value)?)?;
                        Ok(ScriptValue::from_json(&describe_values(&values)))
                    }
                }
            }
            "table" => table(&args),
            "bar" => self.chart(ChartKind::Bar, &args),
            "line" => self.chart(ChartKind::Line, &args),
            "scatter" => self.chart(ChartKind::Scatter, &args),
            "hist" => self.hist(&args),
            _ => Err(format!("unknown function '{}'", name)),
        }
    }

    fn print(&mut self, args: &[ScriptValue]) -> EvalResult {
        let line = args
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        if self.output.len() + line.len() + 1 > self.limits.max_output_bytes {
            return Err(format!(
                "output exceeds {} bytes",
                self.limits.max_output_bytes
            ));
        }
        self.output.push_str(&line);
        self.output.push('\n');
        Ok(ScriptValue::Null)
    }

    fn next_chart_name(&mut self, args: &[ScriptValue], position: usize) -> Result<String, String> {
        if self.charts_drawn >= self.limits.max_charts {
            return Err(format!("at most {} charts can be drawn", self.limits.max_charts));
        }
        self.charts_drawn += 1;
        Ok(text_arg(args, position).unwrap_or_else(|| format!("chart_{}", self.charts_drawn)))
    }

    fn submit(&mut self, name: String, kind: ChartKind, title: Option<String>, points: Vec<ChartPoint>) -> EvalResult {
        let spec = ChartSpec {
            kind,
            title: title.unwrap_or_else(|| name.clone()),
            points,
        };
        self.sink.draw(ChartRequest { name, spec })?;
        Ok(ScriptValue::Null)
    }

    /// `bar(x, y, title, name)` 等
    fn chart(&mut self, kind: ChartKind, args: &[ScriptValue]) -> EvalResult {
        let label = match kind {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
        };
        arity(label, args, 2, 4)?;
        let xs = list_arg(label, &args[0])?;
        let ys = list_arg(label, &args[1])?;
        same_length(label, xs, ys)?;

        // 折線與散佈圖在 x 全為數字時使用實際數值
        let numeric_x = kind != ChartKind::Bar
            && xs.iter().all(|x| matches!(x, ScriptValue::Number(_)));

        let mut points = Vec::new();
        for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
            let Some(y) = y.as_number() else {
                continue;
            };
            let position = if numeric_x {
                x.as_number().unwrap_or(i as f64)
            } else {
                i as f64
            };
            points.push(ChartPoint {
                label: x.to_string(),
                x: position,
                y,
            });
        }

        let name = self.next_chart_name(args, 3)?;
        self.submit(name, kind, text_arg(args, 2), points)
    }

    /// `hist(values, bins, title, name)`
    fn hist(&mut self, args: &[ScriptValue]) -> EvalResult {
        arity("hist", args, 1, 4)?;
        let values = numbers("hist", list_arg("hist", &args[0])?)?;
        let bins = match args.get(1) {
            Some(ScriptValue::Null) => DEFAULT_BINS,
            _ => count_arg("hist", args, 1, DEFAULT_BINS)?,
        };
        if bins == 0 {
            return Err("hist() needs at least one bin".to_string());
        }
        if bins > MAX_HIST_BINS {
            return Err(format!("hist() bins must be <= {}", MAX_HIST_BINS));
        }
        let points = histogram(&values, bins);
        let name = self.next_chart_name(args, 3)?;
        self.submit(name, ChartKind::Bar, text_arg(args, 2), points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_bins() {
        let points = histogram(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].y, 2.0);
        assert_eq!(points[1].y, 2.0);

        let constant = histogram(&[5.0, 5.0], 10);
        assert_eq!(constant.len(), 1);
        assert_eq!(constant[0].y, 2.0);
        assert!(histogram(&[], 3).is_empty());
    }

    #[test]
    fn test_table_from_map() {
        let map = ScriptValue::Map(vec![
            ("swaps".to_string(), ScriptValue::Number(12.0)),
            ("volume".to_string(), ScriptValue::Number(1500.25)),
        ]);
        let markdown = match table(&[map]).unwrap() {
            ScriptValue::Str(s) => s,
            other => panic!("unexpected {:?}", other),
        };
        assert!(markdown.contains("| name"));
        assert!(markdown.contains("| swaps"));
        assert!(markdown.contains("1500.25"));
    }

    #[test]
    fn test_format_date() {
        let day = format_date(&ScriptValue::Number(1_700_006_400.0)).unwrap();
        assert_eq!(day, ScriptValue::Str("2023-11-15".to_string()));
        let hour = format_date(&ScriptValue::Number(1_700_000_000.0)).unwrap();
        assert_eq!(hour, ScriptValue::Str("2023-11-14 22:13".to_string()));
        assert_eq!(format_date(&ScriptValue::Null).unwrap(), ScriptValue::Null);
    }
}
