use crate::domain::model::Record;
use serde_json::{Map, Value};

/// 需要攤平的巢狀欄位，依此順序附加到記錄尾端
pub const NESTED_KEYS: [&str; 3] = ["token", "token0", "token1"];

/// 從巢狀物件取出的子欄位
pub const NESTED_SUBFIELDS: [&str; 3] = ["id", "symbol", "name"];

/// 將已知的巢狀欄位攤平為 `<key>_id`、`<key>_symbol`、`<key>_name`。
///
/// 只處理一層，且只在值為物件時處理；其他欄位原樣保留並維持順序。
pub fn flatten_record(record: Record) -> Record {
    let mut kept = Map::new();
    let mut nested: Vec<(&str, Map<String, Value>)> = Vec::new();

    for (key, value) in record.data {
        match (NESTED_KEYS.iter().copied().find(|k| *k == key), value) {
            (Some(known), Value::Object(inner)) => nested.push((known, inner)),
            (_, value) => {
                kept.insert(key, value);
            }
        }
    }

    for known in NESTED_KEYS {
        let Some((_, inner)) = nested.iter().find(|(k, _)| *k == known) else {
            continue;
        };
        for subfield in NESTED_SUBFIELDS {
            let value = inner.get(subfield).cloned().unwrap_or(Value::Null);
            kept.insert(format!("{}_{}", known, subfield), value);
        }
    }

    Record::new(kept)
}

pub fn flatten_records(records: Vec<Record>) -> Vec<Record> {
    records.into_iter().map(flatten_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::new(map),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_flatten_token_pair() {
        let flat = flatten_record(record(json!({
            "id": "0xpool",
            "token0": {"id": "0xa", "symbol": "USDC", "name": "USD Coin"},
            "token1": {"id": "0xb", "symbol": "WETH"},
            "feeTier": "500"
        })));

        let keys: Vec<&str> = flat.data.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "feeTier",
                "token0_id",
                "token0_symbol",
                "token0_name",
                "token1_id",
                "token1_symbol",
                "token1_name"
            ]
        );
        assert_eq!(flat.data["token0_symbol"], "USDC");
        assert_eq!(flat.data["token1_name"], Value::Null);
    }

    #[test]
    fn test_unknown_and_scalar_fields_pass_through() {
        let flat = flatten_record(record(json!({
            "token": "0xnot-a-map",
            "pool": {"id": "0xpool"}
        })));

        assert_eq!(flat.data["token"], "0xnot-a-map");
        assert_eq!(flat.data["pool"], json!({"id": "0xpool"}));
        assert_eq!(flat.data.len(), 2);
    }
}
