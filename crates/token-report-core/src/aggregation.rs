//! Per-model and per-API-key rollups of usage records

use crate::models::UsageRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Running totals for one group of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateBucket {
    pub count: u64,
    pub total_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_duration_ms: f64,
}

impl AggregateBucket {
    fn add(&mut self, record: &UsageRecord) {
        self.count += 1;
        self.total_cost += record.cost();
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens());
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens());
        self.total_duration_ms += record.duration_ms();
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Mean request duration, `None` for an empty bucket
    pub fn average_duration_ms(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_duration_ms / self.count as f64)
    }
}

/// Buckets keyed by label, kept in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketMap {
    buckets: Vec<(String, AggregateBucket)>,
    index: HashMap<String, usize>,
}

impl BucketMap {
    fn bucket_mut(&mut self, label: &str) -> &mut AggregateBucket {
        let slot = match self.index.get(label) {
            Some(&slot) => slot,
            None => {
                self.buckets.push((label.to_string(), AggregateBucket::default()));
                self.index.insert(label.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[slot].1
    }

    pub fn get(&self, label: &str) -> Option<&AggregateBucket> {
        self.index.get(label).map(|&slot| &self.buckets[slot].1)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregateBucket)> {
        self.buckets
            .iter()
            .map(|(label, bucket)| (label.as_str(), bucket))
    }

    /// Sum of record counts across all buckets
    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(|(_, bucket)| bucket.count).sum()
    }

    /// Buckets by descending cost; ties keep first-seen order
    pub fn sorted_by_cost(&self) -> Vec<(&str, &AggregateBucket)> {
        let mut rows: Vec<_> = self.iter().collect();
        rows.sort_by(|a, b| b.1.total_cost.total_cmp(&a.1.total_cost));
        rows
    }

    /// Buckets by descending request count; ties keep first-seen order
    pub fn sorted_by_count(&self) -> Vec<(&str, &AggregateBucket)> {
        let mut rows: Vec<_> = self.iter().collect();
        rows.sort_by(|a, b| b.1.count.cmp(&a.1.count));
        rows
    }
}

/// Both rollups for one report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageBreakdown {
    pub by_model: BucketMap,
    pub by_key: BucketMap,
}

impl UsageBreakdown {
    /// Group every record once by model and once by API key label
    pub fn from_records(records: &[UsageRecord]) -> Self {
        let mut breakdown = Self::default();

        for record in records {
            breakdown.by_model.bucket_mut(record.model()).add(record);
        }
        for record in records {
            breakdown.by_key.bucket_mut(record.key_label()).add(record);
        }

        tracing::debug!(
            records = records.len(),
            models = breakdown.by_model.len(),
            keys = breakdown.by_key.len(),
            "Aggregated usage records"
        );

        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> UsageRecord {
        UsageRecord::new(value)
    }

    #[test]
    fn test_gpt4_scenario() {
        let records = vec![
            record(json!({"model": "gpt-4", "cost": 1.5, "input_tokens": 100, "output_tokens": 50})),
            record(json!({"model": "gpt-4", "cost": 2.5, "input_tokens": 200, "output_tokens": 80})),
        ];

        let breakdown = UsageBreakdown::from_records(&records);
        let bucket = breakdown.by_model.get("gpt-4").unwrap();

        assert_eq!(bucket.count, 2);
        assert_eq!(bucket.total_cost, 4.0);
        assert_eq!(bucket.input_tokens, 300);
        assert_eq!(bucket.output_tokens, 130);
        assert_eq!(bucket.total_tokens(), 430);
    }

    #[test]
    fn test_every_record_lands_in_one_bucket_per_grouping() {
        let records = vec![
            record(json!({"model": "a", "key_name": "k1"})),
            record(json!({"model": "b", "api_key": {"name": "k2"}})),
            record(json!({"model": "", "key_name": "k1"})),
            record(json!({})),
            record(json!("not even an object")),
        ];

        let breakdown = UsageBreakdown::from_records(&records);

        assert_eq!(breakdown.by_model.total_count(), records.len() as u64);
        assert_eq!(breakdown.by_key.total_count(), records.len() as u64);
        assert_eq!(breakdown.by_model.get("unknown").unwrap().count, 3);
        assert_eq!(breakdown.by_key.get("k1").unwrap().count, 2);
        assert_eq!(breakdown.by_key.get("unknown").unwrap().count, 2);
    }

    #[test]
    fn test_dirty_numbers_do_not_disturb_totals() {
        let records = vec![
            record(json!({"model": "m", "cost": "oops", "input_tokens": null, "duration_ms": []})),
            record(json!({"model": "m", "cost": 0.5, "input_tokens": 10, "duration_ms": 40})),
        ];

        let bucket = *UsageBreakdown::from_records(&records)
            .by_model
            .get("m")
            .unwrap();

        assert_eq!(bucket.count, 2);
        assert_eq!(bucket.total_cost, 0.5);
        assert_eq!(bucket.input_tokens, 10);
        assert_eq!(bucket.total_duration_ms, 40.0);
        assert_eq!(bucket.average_duration_ms(), Some(20.0));
    }

    #[test]
    fn test_huge_token_counts_saturate() {
        let records = vec![
            record(json!({"model": "m", "input_tokens": 1e19, "output_tokens": 1e19})),
            record(json!({"model": "m", "input_tokens": 1e19, "output_tokens": 1e19})),
        ];

        let bucket = *UsageBreakdown::from_records(&records)
            .by_model
            .get("m")
            .unwrap();

        assert_eq!(bucket.count, 2);
        assert_eq!(bucket.input_tokens, u64::MAX);
        assert_eq!(bucket.output_tokens, u64::MAX);
        assert_eq!(bucket.total_tokens(), u64::MAX);
    }

    #[test]
    fn test_sorting_is_descending_and_stable() {
        let records = vec![
            record(json!({"model": "cheap", "cost": 1.0, "key_name": "x"})),
            record(json!({"model": "tie-a", "cost": 2.0, "key_name": "y"})),
            record(json!({"model": "tie-b", "cost": 2.0, "key_name": "y"})),
            record(json!({"model": "pricey", "cost": 9.0, "key_name": "z"})),
        ];

        let breakdown = UsageBreakdown::from_records(&records);

        let models: Vec<&str> = breakdown
            .by_model
            .sorted_by_cost()
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(models, vec!["pricey", "tie-a", "tie-b", "cheap"]);

        let keys: Vec<&str> = breakdown
            .by_key
            .sorted_by_count()
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(keys, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_empty_input() {
        let breakdown = UsageBreakdown::from_records(&[]);
        assert!(breakdown.by_model.is_empty());
        assert!(breakdown.by_key.is_empty());
        assert_eq!(AggregateBucket::default().average_duration_ms(), None);
    }
}
