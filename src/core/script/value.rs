use crate::core::dataset::number;
use serde_json::{Map, Value as Json};
use std::cmp::Ordering;
use std::fmt;

/// 腳本執行期的值
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<ScriptValue>),
    /// 保持插入順序的對應表
    Map(Vec<(String, ScriptValue)>),
    /// 綁定為 `df` 的資料集
    Frame,
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Number(_) => "number",
            ScriptValue::Str(_) => "string",
            ScriptValue::List(_) => "list",
            ScriptValue::Map(_) => "map",
            ScriptValue::Frame => "dataframe",
        }
    }

    pub fn from_json(value: &Json) -> Self {
        match value {
            Json::Null => ScriptValue::Null,
            Json::Bool(b) => ScriptValue::Bool(*b),
            Json::Number(n) => n.as_f64().map(ScriptValue::Number).unwrap_or(ScriptValue::Null),
            Json::String(s) => ScriptValue::Str(s.clone()),
            Json::Array(items) => ScriptValue::List(items.iter().map(Self::from_json).collect()),
            Json::Object(map) => ScriptValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            ScriptValue::Null => Json::Null,
            ScriptValue::Bool(b) => Json::Bool(*b),
            ScriptValue::Number(n) => {
                // 整數值輸出為整數
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Json::from(*n as i64)
                } else {
                    number(*n)
                }
            }
            ScriptValue::Str(s) => Json::String(s.clone()),
            ScriptValue::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            ScriptValue::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                Json::Object(map)
            }
            ScriptValue::Frame => Json::String("<dataframe>".to_string()),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            ScriptValue::Null => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ScriptValue::Str(s) => !s.is_empty(),
            ScriptValue::List(items) => !items.is_empty(),
            ScriptValue::Map(entries) => !entries.is_empty(),
            ScriptValue::Frame => true,
        }
    }

    /// 數值轉換：數字、布林與可解析的字串
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            ScriptValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScriptValue::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ScriptValue::List(_) | ScriptValue::Map(_) | ScriptValue::Frame
        )
    }

    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            ScriptValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// 字串位元組數加上清單與對應表的元素數（遞迴）
    pub fn footprint(&self) -> usize {
        match self {
            ScriptValue::Str(s) => s.len(),
            ScriptValue::List(items) => items
                .iter()
                .fold(items.len(), |total, item| total.saturating_add(item.footprint())),
            ScriptValue::Map(entries) => entries.iter().fold(entries.len(), |total, (key, value)| {
                total
                    .saturating_add(key.len())
                    .saturating_add(value.footprint())
            }),
            _ => 0,
        }
    }

    /// 用於分組與去重的鍵
    pub fn key(&self) -> String {
        self.to_string()
    }
}

/// 排序比較：可解析為數字的值（含數字字串）在前並依數值排序，
/// 其次是其他字串、清單與對應表，null 排最後
pub fn compare(a: &ScriptValue, b: &ScriptValue) -> Ordering {
    fn rank(value: &ScriptValue) -> u8 {
        match value {
            ScriptValue::Null => 3,
            v if v.as_number().is_some() => 0,
            ScriptValue::Str(_) => 1,
            _ => 2,
        }
    }

    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => {}
        ordering => return ordering,
    }
    match (a, b) {
        (ScriptValue::Str(x), ScriptValue::Str(y)) if a.as_number().is_none() => x.cmp(y),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{}", b),
            ScriptValue::Number(n) => write!(f, "{}", format_number(*n)),
            ScriptValue::Str(s) => write!(f, "{}", s),
            ScriptValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        ScriptValue::Str(s) => write!(f, "\"{}\"", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            ScriptValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match value {
                        ScriptValue::Str(s) => write!(f, "\"{}\": \"{}\"", key, s)?,
                        other => write!(f, "\"{}\": {}", key, other)?,
                    }
                }
                write!(f, "}}")
            }
            ScriptValue::Frame => write!(f, "<dataframe>"),
        }
    }
}
