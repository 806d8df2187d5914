//! Fetch-all pagination over the usage endpoint
//!
//! The usage endpoint wraps each page in one of several envelopes depending on
//! the server version. Each envelope is recognised by a pure matcher; matchers
//! run in a fixed order and the first hit wins. An unrecognised envelope is
//! read as an empty page, which ends pagination instead of failing the run.

use crate::config::DateRange;
use crate::error::Result;
use crate::models::record::{parse_numeric, to_count};
use crate::models::UsageRecord;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Records requested per page
pub const PAGE_SIZE: u32 = 100;

/// Hard stop for servers that never signal the last page
pub const MAX_PAGES: u32 = 1000;

/// One normalized page: its records plus the server's total count, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub total: Option<u64>,
}

/// Pure envelope matcher
pub type ShapeMatcher = fn(&Value) -> Option<Page>;

/// Envelope matchers in priority order
pub const SHAPE_MATCHERS: [(&str, ShapeMatcher); 6] = [
    ("data.items", match_data_items),
    ("data.records", match_data_records),
    ("data[]", match_data_array),
    ("items", match_items),
    ("records", match_records),
    ("[]", match_bare_array),
];

/// A zero, missing or non-numeric total is no hint at all
fn total_hint(value: Option<&Value>) -> Option<u64> {
    parse_numeric(value).map(to_count).filter(|n| *n > 0)
}

fn list_with_total(response: &Value, list: &str, total: &str) -> Option<Page> {
    let records = response.pointer(list)?.as_array()?;
    Some(Page {
        records: records.clone(),
        total: total_hint(response.pointer(total)),
    })
}

fn bare_list(value: Option<&Value>) -> Option<Page> {
    let records = value?.as_array()?;
    Some(Page {
        records: records.clone(),
        total: None,
    })
}

pub fn match_data_items(response: &Value) -> Option<Page> {
    list_with_total(response, "/data/items", "/data/total")
}

pub fn match_data_records(response: &Value) -> Option<Page> {
    list_with_total(response, "/data/records", "/data/total")
}

pub fn match_data_array(response: &Value) -> Option<Page> {
    bare_list(response.get("data"))
}

pub fn match_items(response: &Value) -> Option<Page> {
    list_with_total(response, "/items", "/total")
}

pub fn match_records(response: &Value) -> Option<Page> {
    list_with_total(response, "/records", "/total")
}

pub fn match_bare_array(response: &Value) -> Option<Page> {
    bare_list(Some(response))
}

/// Normalize a raw page response with the first matching envelope
pub fn normalize_page(response: &Value) -> Page {
    for (shape, matcher) in SHAPE_MATCHERS {
        if let Some(page) = matcher(response) {
            debug!(shape, records = page.records.len(), total = ?page.total, "Matched page envelope");
            return page;
        }
    }

    debug!("Unrecognized page envelope, treating as empty");
    Page::default()
}

/// Anything that can serve one page of usage records
#[allow(async_fn_in_trait)]
pub trait UsagePageSource {
    async fn fetch_page(&self, range: &DateRange, page: u32, page_size: u32) -> Result<Value>;
}

/// Result of a fetch-all run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedUsage {
    /// Records in arrival order
    pub records: Vec<UsageRecord>,
    /// Number of page requests issued
    pub pages: u32,
    /// Last total count reported by the server
    pub total_hint: Option<u64>,
    /// True when pagination stopped at [`MAX_PAGES`] rather than on its own
    pub truncated: bool,
}

/// Fetch every page of usage records for `range`.
///
/// Stops on the first empty page, once the fetched count reaches the server's
/// total, on a short page, or after [`MAX_PAGES`] pages. `progress` receives
/// `(fetched_so_far, total_hint)` after every non-empty page.
pub async fn fetch_all<S: UsagePageSource>(
    source: &S,
    range: &DateRange,
    mut progress: Option<&mut dyn FnMut(usize, Option<u64>)>,
) -> Result<FetchedUsage> {
    let mut fetched = FetchedUsage::default();
    let mut page = 1u32;

    loop {
        let response = source.fetch_page(range, page, PAGE_SIZE).await?;
        fetched.pages = page;

        let normalized = normalize_page(&response);
        if normalized.total.is_some() {
            fetched.total_hint = normalized.total;
        }

        let received = normalized.records.len();
        if received == 0 {
            debug!(page, "Empty page, pagination complete");
            break;
        }

        fetched
            .records
            .extend(normalized.records.into_iter().map(UsageRecord::new));

        if let Some(report) = progress.as_mut() {
            report(fetched.records.len(), fetched.total_hint);
        }

        if let Some(total) = fetched.total_hint {
            if fetched.records.len() as u64 >= total {
                debug!(page, total, "Reached reported total");
                break;
            }
        }

        if received < PAGE_SIZE as usize {
            debug!(page, received, "Short page, pagination complete");
            break;
        }

        if page >= MAX_PAGES {
            warn!(
                "Reached page limit of {}, stopping pagination ({} records fetched)",
                MAX_PAGES,
                fetched.records.len()
            );
            fetched.truncated = true;
            break;
        }

        page += 1;
    }

    info!(
        records = fetched.records.len(),
        pages = fetched.pages,
        "Fetched usage records"
    );

    Ok(fetched)
}
