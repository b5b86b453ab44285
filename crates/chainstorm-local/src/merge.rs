//! Data-mapping combination rules for Update and Merge.
//!
//! Merge combines an incoming value with the stored one according to a closed
//! rule table:
//!
//! | stored | incoming | result              |
//! |--------|----------|---------------------|
//! | string | string   | stored + incoming   |
//! | number | number   | stored + incoming   |
//! | bool   | bool     | stored \|\| incoming |
//!
//! Every other pairing is `UnsupportedMergeType`. Keys absent from the stored
//! mapping are inserted as-is.

use chainstorm_core::{Data, GraphError, Result};
use serde_json::{Number, Value};

/// Overwrite the keys present in `incoming`, leaving the rest untouched.
pub fn update_data(stored: &Data, incoming: Data) -> Data {
    let mut out = stored.clone();
    for (key, value) in incoming {
        out.insert(key, value);
    }
    out
}

/// Combine `incoming` into a copy of `stored`.
///
/// The result is built completely before it is returned, so a failure on any
/// key leaves the caller's record untouched.
pub fn merge_data(stored: &Data, incoming: Data) -> Result<Data> {
    let mut out = stored.clone();
    for (key, value) in incoming {
        let combined = match out.get(&key) {
            None => value,
            Some(existing) => combine(&key, existing, value)?,
        };
        out.insert(key, combined);
    }
    Ok(out)
}

fn combine(key: &str, existing: &Value, incoming: Value) -> Result<Value> {
    match (existing, incoming) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::Number(a), Value::Number(b)) => add_numbers(key, a, &b).map(Value::Number),
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || b)),
        (existing, incoming) => Err(unsupported(key, existing, &incoming)),
    }
}

/// Integer addition when both sides are integers and it does not overflow,
/// floating-point addition otherwise.
fn add_numbers(key: &str, a: &Number, b: &Number) -> Result<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }

    let sum = a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN);
    Number::from_f64(sum).ok_or_else(|| GraphError::UnsupportedMergeType {
        key: key.to_string(),
        existing: "number",
        incoming: "number",
    })
}

fn unsupported(key: &str, existing: &Value, incoming: &Value) -> GraphError {
    GraphError::UnsupportedMergeType {
        key: key.to_string(),
        existing: type_name(existing),
        incoming: type_name(incoming),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Data {
        chainstorm_core::data_from_value(value).unwrap()
    }

    #[test]
    fn strings_concatenate_stored_first() {
        let merged = merge_data(&data(json!({"a": "y"})), data(json!({"a": "x"}))).unwrap();
        assert_eq!(merged["a"], "yx");
    }

    #[test]
    fn integers_add() {
        let merged = merge_data(&data(json!({"n": 10})), data(json!({"n": 5}))).unwrap();
        assert_eq!(merged["n"], 15);
        assert!(merged["n"].is_i64());
    }

    #[test]
    fn mixed_numbers_add_as_float() {
        let merged = merge_data(&data(json!({"n": 1})), data(json!({"n": 0.5}))).unwrap();
        assert_eq!(merged["n"], 1.5);
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let merged =
            merge_data(&data(json!({"n": i64::MAX})), data(json!({"n": i64::MAX}))).unwrap();
        assert!(merged["n"].is_u64());

        let merged = merge_data(&data(json!({"n": u64::MAX})), data(json!({"n": 1}))).unwrap();
        assert!(merged["n"].is_f64());
    }

    #[test]
    fn booleans_or() {
        let merged = merge_data(
            &data(json!({"t": false, "u": true})),
            data(json!({"t": true, "u": false})),
        )
        .unwrap();
        assert_eq!(merged["t"], true);
        assert_eq!(merged["u"], true);
    }

    #[test]
    fn new_keys_are_inserted_untouched() {
        let merged = merge_data(&data(json!({"a": 1})), data(json!({"b": [1, 2]}))).unwrap();
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], json!([1, 2]));
    }

    #[test]
    fn unsupported_pairs_fail() {
        let stored = data(json!({"s": "x", "arr": [1], "nil": null}));

        let err = merge_data(&stored, data(json!({"s": 1}))).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnsupportedMergeType {
                existing: "string",
                incoming: "number",
                ..
            }
        ));
        assert!(merge_data(&stored, data(json!({"arr": [2]}))).is_err());
        assert!(merge_data(&stored, data(json!({"nil": null}))).is_err());
    }

    #[test]
    fn update_overwrites_only_given_keys() {
        let updated = update_data(&data(json!({"a": 1, "b": 2})), data(json!({"b": 3})));
        assert_eq!(Value::Object(updated), json!({"a": 1, "b": 3}));
    }
}
