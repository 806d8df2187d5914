//! Terminal summary for a generated report
//!
//! Mirrors the HTML tables with comfy-table so the numbers are visible
//! without opening the browser.

use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};
use token_report_core::export::{
    format_currency, format_duration_ms, format_large_number, format_number,
};
use token_report_core::{AggregateBucket, StatsSummary, UsageBreakdown};

/// One-line totals, e.g. `Requests: 42 | Tokens: 2.50M (in 1.20M / out 1.30M) | Cost: $12.5000`
pub fn format_summary(stats: &StatsSummary, record_count: usize) -> String {
    format!(
        "Requests: {} | Tokens: {} (in {} / out {}) | Cost: {}",
        format_number(stats.requests_or(record_count)),
        format_large_number(stats.total_tokens),
        format_large_number(stats.total_input_tokens),
        format_large_number(stats.total_output_tokens),
        format_currency(stats.total_cost),
    )
}

/// Per-model table, most expensive first
pub fn format_model_table(breakdown: &UsageBreakdown, no_color: bool) -> String {
    let mut table = new_table(
        &["Model", "Requests", "Input", "Output", "Cost"],
        no_color,
    );

    for (label, bucket) in breakdown.by_model.sorted_by_cost() {
        let mut row = vec![Cell::new(label)];
        row.extend(count_cells(bucket));
        row.push(right(format_currency(bucket.total_cost)));
        table.add_row(row);
    }

    finish(table, breakdown.by_model.is_empty())
}

/// Per-key table, busiest first
pub fn format_key_table(breakdown: &UsageBreakdown, no_color: bool) -> String {
    let mut table = new_table(
        &["API Key", "Requests", "Input", "Output", "Avg Duration", "Cost"],
        no_color,
    );

    for (label, bucket) in breakdown.by_key.sorted_by_count() {
        let mut row = vec![Cell::new(label)];
        row.extend(count_cells(bucket));
        row.push(right(format_duration_ms(bucket.average_duration_ms())));
        row.push(right(format_currency(bucket.total_cost)));
        table.add_row(row);
    }

    finish(table, breakdown.by_key.is_empty())
}

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }

    table
}

fn count_cells(bucket: &AggregateBucket) -> [Cell; 3] {
    [
        right(format_number(bucket.count)),
        right(format_large_number(bucket.input_tokens)),
        right(format_large_number(bucket.output_tokens)),
    ]
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn finish(table: Table, empty: bool) -> String {
    if empty {
        return "(no usage records in this range)".to_string();
    }
    table.to_string()
}
