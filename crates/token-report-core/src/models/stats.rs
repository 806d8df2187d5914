//! Usage statistics summary from `/api/v1/usage/stats`
//!
//! The totals are taken from the server as-is; nothing here is recomputed from
//! the record list except the request-count fallback applied at render time.

use super::record::{first_non_zero, parse_numeric_or_default, to_count};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-reported totals for the queried range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Total requests, if the server reported a non-zero count
    pub total_requests: Option<u64>,
    pub total_tokens: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// `total_cost`, falling back to `total_actual_cost`
    pub total_cost: f64,
}

impl StatsSummary {
    /// Build a summary from a stats response.
    ///
    /// Unwraps a `data` envelope when the response has one. Missing or
    /// non-numeric fields default to 0.
    pub fn from_response(response: &Value) -> Self {
        let stats = match response.get("data") {
            Some(data) if data.is_object() => data,
            _ => response,
        };

        let count = |key: &str| to_count(parse_numeric_or_default(stats.get(key), 0.0));

        let total_cost =
            first_non_zero(stats, &["total_cost", "total_actual_cost"]).unwrap_or(0.0);

        Self {
            total_requests: Some(count("total_requests")).filter(|n| *n > 0),
            total_tokens: count("total_tokens"),
            total_input_tokens: count("total_input_tokens"),
            total_output_tokens: count("total_output_tokens"),
            total_cost,
        }
    }

    /// Request count to display, falling back to the number of fetched records
    pub fn requests_or(&self, record_count: usize) -> u64 {
        self.total_requests.unwrap_or(record_count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_flat_response() {
        let stats = StatsSummary::from_response(&json!({
            "total_requests": 42,
            "total_cost": 12.5,
            "total_tokens": 1500,
            "total_input_tokens": 1000,
            "total_output_tokens": 500
        }));
        assert_eq!(stats.total_requests, Some(42));
        assert_eq!(stats.total_cost, 12.5);
        assert_eq!(stats.total_tokens, 1500);
        assert_eq!(stats.total_input_tokens, 1000);
        assert_eq!(stats.total_output_tokens, 500);
    }

    #[test]
    fn test_unwraps_data_envelope() {
        let stats = StatsSummary::from_response(&json!({
            "code": 0,
            "data": {"total_requests": 7, "total_actual_cost": "3.25"}
        }));
        assert_eq!(stats.total_requests, Some(7));
        assert_eq!(stats.total_cost, 3.25);
    }

    #[test]
    fn test_zero_total_cost_falls_back_to_actual_cost() {
        let stats = StatsSummary::from_response(&json!({
            "total_cost": 0,
            "total_actual_cost": 1.5
        }));
        assert_eq!(stats.total_cost, 1.5);
    }

    #[test]
    fn test_missing_and_dirty_fields_default_to_zero() {
        let stats = StatsSummary::from_response(&json!({
            "total_tokens": "lots",
            "total_cost": null
        }));
        assert_eq!(stats, StatsSummary::default());
        assert_eq!(stats.requests_or(17), 17);
    }

    #[test]
    fn test_non_object_response() {
        let stats = StatsSummary::from_response(&json!("maintenance"));
        assert_eq!(stats.requests_or(0), 0);
        assert_eq!(stats.total_cost, 0.0);
    }
}
