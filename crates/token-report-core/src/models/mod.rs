//! Data models for token-report

pub mod record;
pub mod stats;

pub use record::{parse_numeric, parse_numeric_or_default, UsageRecord, UNKNOWN_LABEL};
pub use stats::StatsSummary;
