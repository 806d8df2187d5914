//! token-report-core - Core library for token-report
//!
//! Provides the authenticated API client, pagination engine, usage
//! aggregation and HTML export for usage-billing reports.

pub mod aggregation;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod pagination;

pub use aggregation::{AggregateBucket, BucketMap, UsageBreakdown};
pub use client::{ApiClient, Session};
pub use config::{load_config, Config, DateRange, PartialConfig};
pub use error::ReportError;
pub use export::{export_usage_to_json, render_report, save_report};
pub use models::{StatsSummary, UsageRecord};
pub use pagination::{fetch_all, FetchedUsage, UsagePageSource};
