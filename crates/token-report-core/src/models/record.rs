//! Usage record model
//!
//! The usage endpoint does not commit to a schema: depending on the deployment
//! a record carries `total_cost` or `cost`, `input_tokens` or `prompt_tokens`,
//! and so on. Records are therefore kept as raw JSON and read through
//! accessors that apply a fixed field precedence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label used when a record carries no model or API key name
pub const UNKNOWN_LABEL: &str = "unknown";

/// Read a JSON value as a number.
///
/// Numbers are taken as-is, strings are parsed after trimming. Anything else
/// (null, bool, arrays, objects, unparsable or non-finite strings) yields `None`.
pub fn parse_numeric(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Read a JSON value as a number, falling back to `default`.
pub fn parse_numeric_or_default(value: Option<&Value>, default: f64) -> f64 {
    parse_numeric(value).unwrap_or(default)
}

/// Truncate a coerced number to a token count. Negative values count as 0.
pub fn to_count(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 {
        n.trunc() as u64
    } else {
        0
    }
}

/// First field of `object` named in `keys` holding a non-zero number
pub(crate) fn first_non_zero(object: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| parse_numeric(object.get(*key)).filter(|n| *n != 0.0))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// One API call's accounting entry, as returned by the usage endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageRecord(Value);

impl UsageRecord {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// First field in `keys` holding a non-zero numeric value.
    ///
    /// A zero primary field falls through to the alternate name, since some
    /// deployments populate both and leave the unused one at 0.
    fn first_numeric(&self, keys: &[&str]) -> Option<f64> {
        first_non_zero(&self.0, keys)
    }

    /// Model identifier (`model`), `"unknown"` when absent or empty
    pub fn model(&self) -> &str {
        non_empty_str(self.0.get("model")).unwrap_or(UNKNOWN_LABEL)
    }

    /// API key label: `api_key.name`, then `key_name`, then `"unknown"`
    pub fn key_label(&self) -> &str {
        non_empty_str(self.0.pointer("/api_key/name"))
            .or_else(|| non_empty_str(self.0.get("key_name")))
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Cost in USD: `total_cost`, then `cost`, else 0
    pub fn cost(&self) -> f64 {
        self.first_numeric(&["total_cost", "cost"]).unwrap_or(0.0)
    }

    /// Input tokens: `input_tokens`, then `prompt_tokens`, else 0
    pub fn input_tokens(&self) -> u64 {
        to_count(
            self.first_numeric(&["input_tokens", "prompt_tokens"])
                .unwrap_or(0.0),
        )
    }

    /// Output tokens: `output_tokens`, then `completion_tokens`, else 0
    pub fn output_tokens(&self) -> u64 {
        to_count(
            self.first_numeric(&["output_tokens", "completion_tokens"])
                .unwrap_or(0.0),
        )
    }

    /// Request duration in milliseconds: `duration_ms`, then `duration`, else 0
    pub fn duration_ms(&self) -> f64 {
        self.first_numeric(&["duration_ms", "duration"])
            .unwrap_or(0.0)
    }
}

impl From<Value> for UsageRecord {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_numeric_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_numeric(Some(&json!(1.5))), Some(1.5));
        assert_eq!(parse_numeric(Some(&json!(42))), Some(42.0));
        assert_eq!(parse_numeric(Some(&json!(" 0.25 "))), Some(0.25));
    }

    #[test]
    fn test_parse_numeric_rejects_everything_else() {
        assert_eq!(parse_numeric(None), None);
        assert_eq!(parse_numeric(Some(&Value::Null)), None);
        assert_eq!(parse_numeric(Some(&json!(true))), None);
        assert_eq!(parse_numeric(Some(&json!("abc"))), None);
        assert_eq!(parse_numeric(Some(&json!("NaN"))), None);
        assert_eq!(parse_numeric(Some(&json!([1]))), None);
        assert_eq!(parse_numeric_or_default(Some(&json!({})), 7.0), 7.0);
    }

    #[test]
    fn test_to_count_truncates_and_clamps() {
        assert_eq!(to_count(12.9), 12);
        assert_eq!(to_count(-3.0), 0);
        assert_eq!(to_count(f64::NAN), 0);
    }

    #[test]
    fn test_defaults_for_empty_record() {
        let record = UsageRecord::new(json!({}));
        assert_eq!(record.model(), "unknown");
        assert_eq!(record.key_label(), "unknown");
        assert_eq!(record.cost(), 0.0);
        assert_eq!(record.input_tokens(), 0);
        assert_eq!(record.output_tokens(), 0);
        assert_eq!(record.duration_ms(), 0.0);
    }

    #[test]
    fn test_primary_fields_win_over_fallbacks() {
        let record = UsageRecord::new(json!({
            "total_cost": 2.0,
            "cost": 9.0,
            "input_tokens": 10,
            "prompt_tokens": 99,
            "output_tokens": 5,
            "completion_tokens": 99,
            "duration_ms": 120,
            "duration": 9999
        }));
        assert_eq!(record.cost(), 2.0);
        assert_eq!(record.input_tokens(), 10);
        assert_eq!(record.output_tokens(), 5);
        assert_eq!(record.duration_ms(), 120.0);
    }

    #[test]
    fn test_fallback_fields_used_when_primary_missing_or_dirty() {
        let record = UsageRecord::new(json!({
            "total_cost": "n/a",
            "cost": "0.75",
            "prompt_tokens": "30",
            "completion_tokens": 12.0,
            "duration": 45
        }));
        assert_eq!(record.cost(), 0.75);
        assert_eq!(record.input_tokens(), 30);
        assert_eq!(record.output_tokens(), 12);
        assert_eq!(record.duration_ms(), 45.0);
    }

    #[test]
    fn test_zero_primary_falls_through() {
        let record = UsageRecord::new(json!({
            "total_cost": 0,
            "cost": 1.25,
            "input_tokens": 0,
            "prompt_tokens": 64
        }));
        assert_eq!(record.cost(), 1.25);
        assert_eq!(record.input_tokens(), 64);
    }

    #[test]
    fn test_key_label_precedence() {
        let nested = UsageRecord::new(json!({"api_key": {"name": "ci"}, "key_name": "flat"}));
        assert_eq!(nested.key_label(), "ci");

        let flat = UsageRecord::new(json!({"api_key": {"id": 3}, "key_name": "flat"}));
        assert_eq!(flat.key_label(), "flat");

        let blank = UsageRecord::new(json!({"key_name": "  "}));
        assert_eq!(blank.key_label(), "unknown");
    }

    #[test]
    fn test_non_object_record_uses_defaults() {
        let record = UsageRecord::new(json!("garbage"));
        assert_eq!(record.model(), "unknown");
        assert_eq!(record.cost(), 0.0);
    }
}
