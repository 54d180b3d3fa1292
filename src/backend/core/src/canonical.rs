//! Canonical JSON serialization.
//!
//! Cache values and tracker set members are compared by their serialized
//! bytes: Redis SADD/SREM de-duplicate on the raw string, and cache hits rely
//! on content-equal values writing identical payloads. Serialization here is
//! therefore canonical: object keys sorted and array elements sorted by
//! their own canonical form, so content-equal values are byte-identical.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Serialize a value to its canonical JSON string.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let raw = serde_json::to_value(value)?;
    let normalized = normalize(raw);
    Ok(serde_json::to_string(&normalized)?)
}

/// Recursively normalize a JSON value: rebuild objects in key order and sort
/// array elements by their canonical serialization. Keys are sorted
/// explicitly rather than relying on the map backing, which feature
/// unification can switch to insertion order.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => {
            let mut normalized: Vec<Value> = items.into_iter().map(normalize).collect();
            normalized.sort_by_cached_key(|v| v.to_string());
            Value::Array(normalized)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Outer {
        zulu: u32,
        alpha: &'static str,
        nested: Inner,
    }

    #[derive(Serialize)]
    struct Inner {
        items: Vec<&'static str>,
    }

    #[test]
    fn test_object_keys_sorted() {
        let a = to_canonical_json(&json!({"b": 1, "a": 2})).unwrap();
        let b = to_canonical_json(&json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_array_elements_sorted() {
        let a = to_canonical_json(&json!({"ids": ["c", "a", "b"]})).unwrap();
        let b = to_canonical_json(&json!({"ids": ["a", "b", "c"]})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_normalization() {
        let value = Outer {
            zulu: 1,
            alpha: "x",
            nested: Inner {
                items: vec!["beta", "alpha"],
            },
        };
        let rendered = to_canonical_json(&value).unwrap();
        assert_eq!(
            rendered,
            r#"{"alpha":"x","nested":{"items":["alpha","beta"]},"zulu":1}"#
        );
    }

    #[test]
    fn test_object_arrays_sorted_by_canonical_form() {
        let a = to_canonical_json(&json!([{"b": 1, "a": 1}, {"a": 0}])).unwrap();
        let b = to_canonical_json(&json!([{"a": 0}, {"a": 1, "b": 1}])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dates_render_as_plain_days() {
        let day = chrono::NaiveDate::from_ymd_opt(2021, 3, 31).unwrap();
        let rendered = to_canonical_json(&json!({ "since": day })).unwrap();
        assert_eq!(rendered, r#"{"since":"2021-03-31"}"#);
    }
}
