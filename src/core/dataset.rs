use crate::core::flatten::flatten_records;
use crate::core::stats;
use crate::domain::model::{DatasetSummary, QueryResult, Record};
use crate::domain::ports::Storage;
use crate::utils::error::{AnalysisError, Result};
use serde_json::{json, Map, Number, Value};

/// 以欄為單位的表格資料；缺值為 `Value::Null`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TabularDataset {
    /// 欄位為所有記錄鍵的聯集，依首次出現順序
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.data.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.data.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].clone()).collect())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(cell_to_text))?;
        }
        writer
            .into_inner()
            .map_err(|e| AnalysisError::persistence("csv buffer", e.error()))
    }

    /// 讀回 CSV，數字字串轉為數值，空字串轉為 null
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = (0..columns.len())
                .map(|i| record.get(i).map(coerce_cell).unwrap_or(Value::Null))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// 數值欄位的 count / mean / std / min / max
    pub fn describe(&self) -> Map<String, Value> {
        let mut summary = Map::new();
        for (index, name) in self.columns.iter().enumerate() {
            let cells: Vec<&Value> = self
                .rows
                .iter()
                .map(|row| &row[index])
                .filter(|v| !v.is_null())
                .collect();
            if cells.is_empty() || !cells.iter().all(|v| v.is_number()) {
                continue;
            }
            let values: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();
            summary.insert(name.clone(), describe_values(&values));
        }
        summary
    }
}

pub fn describe_values(values: &[f64]) -> Value {
    json!({
        "count": values.len(),
        "mean": stats::mean(values).map(number).unwrap_or(Value::Null),
        "std": stats::std_dev(values).map(number).unwrap_or(Value::Null),
        "min": stats::min(values).map(number).unwrap_or(Value::Null),
        "max": stats::max(values).map(number).unwrap_or(Value::Null),
    })
}

/// 有限浮點數轉 JSON 數值，NaN / inf 轉 null
pub fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn cell_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // 其餘巢狀值以精簡 JSON 保存
        other => other.to_string(),
    }
}

pub fn coerce_cell(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = text.parse::<f64>() {
        if float.is_finite() {
            return number(float);
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

/// 攤平並寫出 CSV。沒有記錄時回傳 NoDataError，且不寫任何檔案。
pub async fn persist<S: Storage>(
    storage: &S,
    path: &str,
    result: QueryResult,
) -> Result<DatasetSummary> {
    if result.records.is_empty() {
        return Err(AnalysisError::NoDataError {
            root_field: result.root_field,
        });
    }

    let records = flatten_records(result.records);
    let dataset = TabularDataset::from_records(&records);
    let bytes = dataset.to_csv_bytes()?;
    storage.write_file(path, &bytes).await?;
    // 子圖的 BigDecimal 以字串回傳，摘要要以讀回後的型別計算
    let summary = TabularDataset::from_csv_bytes(&bytes)?.describe();

    let display_path = storage.display_path(path);
    tracing::info!(
        "💾 Saved {} rows x {} columns to {}",
        dataset.len(),
        dataset.columns.len(),
        display_path
    );

    Ok(DatasetSummary {
        file_path: path.to_string(),
        display_path,
        row_count: dataset.len(),
        summary,
        columns: dataset.columns,
    })
}

pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<TabularDataset> {
    let bytes = storage.read_file(path).await?;
    TabularDataset::from_csv_bytes(&bytes)
}
