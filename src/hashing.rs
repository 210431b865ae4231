//! Canonical JSON and SHA-256 helpers.
//!
//! Every document the engine writes goes through [`canonical_json`], so identical inputs
//! produce byte-identical files.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ExportError, ExportResult};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = canonical_value(value)?;
    serde_json::to_string(&v)
}

/// Canonical JSON with two-space indentation.
pub fn canonical_json_pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = canonical_value(value)?;
    serde_json::to_string_pretty(&v)
}

fn canonical_value<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    Ok(sort_value(&serde_json::to_value(value)?))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Write `value` as canonical JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> ExportResult<()> {
    let text = if pretty {
        canonical_json_pretty(value)?
    } else {
        canonical_json(value)?
    };
    fs::write(path, text).map_err(|e| ExportError::io(path, e))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let obj1 = json!({"z": 1, "a": 2, "m": {"b": 1, "a": [{"y": 0, "x": 1}]}});
        let obj2 = json!({"a": 2, "m": {"a": [{"x": 1, "y": 0}], "b": 1}, "z": 1});
        assert_eq!(canonical_json(&obj1).unwrap(), canonical_json(&obj2).unwrap());
    }

    #[test]
    fn test_hash_deterministic() {
        let data = b"test data";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn test_write_json_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        write_json(&a, &json!({"b": 1, "a": [1, 2]}), false).unwrap();
        write_json(&b, &json!({"a": [1, 2], "b": 1}), false).unwrap();
        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }
}
