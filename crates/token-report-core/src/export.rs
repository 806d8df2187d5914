//! Report export: self-contained HTML and raw JSON
//!
//! The HTML report is rendered into memory first and then written with a
//! single whole-file write.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::path::Path;

use crate::aggregation::{AggregateBucket, UsageBreakdown};
use crate::config::DateRange;
use crate::models::{StatsSummary, UsageRecord};

// ============================================================================
// Number formatting
// ============================================================================

/// Integer with thousands separators: `1234567` -> `1,234,567`
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Large count with K/M/G/T suffix and two decimals: `1500` -> `1.50K`
pub fn format_large_number(n: u64) -> String {
    let value = n as f64;
    if value >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if value >= 1e9 {
        format!("{:.2}G", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        n.to_string()
    }
}

/// Dollar amount with four decimals: `4.0` -> `$4.0000`
pub fn format_currency(amount: f64) -> String {
    format!("${:.4}", amount)
}

/// Request duration: `850ms`, `1.25s`, or `-` when unknown
pub fn format_duration_ms(ms: Option<f64>) -> String {
    match ms {
        Some(ms) if ms >= 1000.0 => format!("{:.2}s", ms / 1000.0),
        Some(ms) => format!("{:.0}ms", ms),
        None => "-".to_string(),
    }
}

/// HTML escape for safe output
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

// ============================================================================
// HTML report
// ============================================================================

const REPORT_CSS: &str = r#"    * { margin: 0; padding: 0; box-sizing: border-box; }
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 20px; color: #333; }
    .container { max-width: 1400px; margin: 0 auto; background: white; border-radius: 12px; box-shadow: 0 20px 60px rgba(0, 0, 0, 0.3); overflow: hidden; }
    .header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 40px; text-align: center; }
    .header h1 { font-size: 32px; margin-bottom: 10px; }
    .header p { font-size: 16px; opacity: 0.9; }
    .stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(250px, 1fr)); gap: 20px; padding: 40px; background: #f8f9fa; }
    .stat-card { background: white; padding: 24px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0, 0, 0, 0.1); }
    .stat-label { font-size: 14px; color: #666; margin-bottom: 8px; text-transform: uppercase; letter-spacing: 0.5px; }
    .stat-value { font-size: 32px; font-weight: bold; color: #667eea; }
    .stat-detail { font-size: 12px; color: #999; margin-top: 8px; }
    .section { padding: 40px; }
    .section-title { font-size: 24px; margin-bottom: 20px; border-bottom: 3px solid #667eea; padding-bottom: 10px; }
    table { width: 100%; border-collapse: collapse; margin-top: 20px; font-size: 14px; }
    th { background: #667eea; color: white; padding: 12px; text-align: left; font-weight: 600; position: sticky; top: 0; }
    td { padding: 12px; border-bottom: 1px solid #eee; }
    tr:hover { background: #f8f9fa; }
    .empty { color: #999; text-align: center; }
    .model-badge { display: inline-block; padding: 4px 8px; border-radius: 4px; font-size: 12px; font-weight: 600; background: #e3f2fd; color: #1976d2; }
    .cost-cell { color: #e91e63; font-weight: 600; }
    .footer { background: #f8f9fa; padding: 20px 40px; text-align: center; color: #666; font-size: 14px; }
"#;

fn write_stat_card(out: &mut String, label: &str, value: &str, detail: &str) -> fmt::Result {
    writeln!(out, "      <div class=\"stat-card\">")?;
    writeln!(out, "        <div class=\"stat-label\">{}</div>", label)?;
    writeln!(out, "        <div class=\"stat-value\">{}</div>", value)?;
    writeln!(out, "        <div class=\"stat-detail\">{}</div>", detail)?;
    writeln!(out, "      </div>")
}

fn write_table_head(out: &mut String, title: &str, columns: &[&str]) -> fmt::Result {
    writeln!(out, "    <div class=\"section\">")?;
    writeln!(out, "      <h2 class=\"section-title\">{}</h2>", title)?;
    writeln!(out, "      <table>")?;
    writeln!(out, "        <thead>")?;
    writeln!(out, "          <tr>")?;
    for column in columns {
        writeln!(out, "            <th>{}</th>", column)?;
    }
    writeln!(out, "          </tr>")?;
    writeln!(out, "        </thead>")?;
    writeln!(out, "        <tbody>")
}

fn write_table_tail(out: &mut String, empty: bool, columns: usize) -> fmt::Result {
    if empty {
        writeln!(
            out,
            "          <tr><td class=\"empty\" colspan=\"{}\">No usage records in this range</td></tr>",
            columns
        )?;
    }
    writeln!(out, "        </tbody>")?;
    writeln!(out, "      </table>")?;
    writeln!(out, "    </div>")
}

fn write_key_row(out: &mut String, label: &str, bucket: &AggregateBucket) -> fmt::Result {
    writeln!(out, "          <tr>")?;
    writeln!(out, "            <td>{}</td>", html_escape(label))?;
    writeln!(out, "            <td>{}</td>", format_number(bucket.count))?;
    writeln!(out, "            <td>{}</td>", format_number(bucket.input_tokens))?;
    writeln!(out, "            <td>{}</td>", format_number(bucket.output_tokens))?;
    writeln!(
        out,
        "            <td>{}</td>",
        format_duration_ms(bucket.average_duration_ms())
    )?;
    writeln!(
        out,
        "            <td class=\"cost-cell\">{}</td>",
        format_currency(bucket.total_cost)
    )?;
    writeln!(out, "          </tr>")
}

fn write_model_row(out: &mut String, label: &str, bucket: &AggregateBucket) -> fmt::Result {
    writeln!(out, "          <tr>")?;
    writeln!(
        out,
        "            <td><span class=\"model-badge\">{}</span></td>",
        html_escape(label)
    )?;
    writeln!(out, "            <td>{}</td>", format_number(bucket.count))?;
    writeln!(out, "            <td>{}</td>", format_number(bucket.input_tokens))?;
    writeln!(out, "            <td>{}</td>", format_number(bucket.output_tokens))?;
    writeln!(
        out,
        "            <td class=\"cost-cell\">{}</td>",
        format_currency(bucket.total_cost)
    )?;
    writeln!(out, "          </tr>")
}

fn render_into(
    out: &mut String,
    stats: &StatsSummary,
    breakdown: &UsageBreakdown,
    record_count: usize,
    range: &DateRange,
    generated_at: NaiveDateTime,
) -> fmt::Result {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "  <meta charset=\"UTF-8\">")?;
    writeln!(
        out,
        "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    )?;
    writeln!(out, "  <title>Token Usage Report ({})</title>", range)?;
    writeln!(out, "  <style>")?;
    out.push_str(REPORT_CSS);
    writeln!(out, "  </style>")?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    writeln!(out, "  <div class=\"container\">")?;

    // Header
    writeln!(out, "    <div class=\"header\">")?;
    writeln!(out, "      <h1>Token Usage Report</h1>")?;
    writeln!(out, "      <p>Period: {}</p>", range)?;
    writeln!(out, "    </div>")?;

    // Summary cards
    writeln!(out, "    <div class=\"stats-grid\">")?;
    write_stat_card(
        out,
        "Total Requests",
        &format_number(stats.requests_or(record_count)),
        "In selected range",
    )?;
    write_stat_card(
        out,
        "Total Tokens",
        &format_large_number(stats.total_tokens),
        &format!(
            "Input: {} / Output: {}",
            format_large_number(stats.total_input_tokens),
            format_large_number(stats.total_output_tokens)
        ),
    )?;
    write_stat_card(
        out,
        "Total Cost",
        &format_currency(stats.total_cost),
        "Actual spend",
    )?;
    writeln!(out, "    </div>")?;

    // By API key, busiest first
    let key_columns = [
        "API Key",
        "Requests",
        "Input Tokens",
        "Output Tokens",
        "Avg Duration",
        "Total Cost",
    ];
    write_table_head(out, "Usage by API Key", &key_columns)?;
    for (label, bucket) in breakdown.by_key.sorted_by_count() {
        write_key_row(out, label, bucket)?;
    }
    write_table_tail(out, breakdown.by_key.is_empty(), key_columns.len())?;

    // By model, most expensive first
    let model_columns = [
        "Model",
        "Requests",
        "Input Tokens",
        "Output Tokens",
        "Total Cost",
    ];
    write_table_head(out, "Usage by Model", &model_columns)?;
    for (label, bucket) in breakdown.by_model.sorted_by_cost() {
        write_model_row(out, label, bucket)?;
    }
    write_table_tail(out, breakdown.by_model.is_empty(), model_columns.len())?;

    writeln!(out, "    <div class=\"footer\">")?;
    writeln!(
        out,
        "      <p>Generated by token-report | {}</p>",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "    </div>")?;
    writeln!(out, "  </div>")?;
    writeln!(out, "</body>")?;
    writeln!(out, "</html>")
}

/// Render the HTML report with an explicit generation timestamp.
///
/// Output depends only on the arguments, so identical inputs give
/// byte-identical documents.
pub fn render_report(
    stats: &StatsSummary,
    breakdown: &UsageBreakdown,
    record_count: usize,
    range: &DateRange,
    generated_at: NaiveDateTime,
) -> Result<String> {
    let mut html = String::with_capacity(16 * 1024);
    render_into(&mut html, stats, breakdown, record_count, range, generated_at)
        .context("Failed to render HTML report")?;
    Ok(html)
}

/// Write a rendered report to `path` in one write, creating parent directories
pub fn save_report(html: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, html)
        .with_context(|| format!("Failed to write HTML report: {}", path.display()))?;

    tracing::info!("Report saved to {}", path.display());
    Ok(())
}

// ============================================================================
// JSON export
// ============================================================================

#[derive(Serialize)]
struct BucketRow<'a> {
    label: &'a str,
    #[serde(flatten)]
    bucket: &'a AggregateBucket,
}

#[derive(Serialize)]
struct UsageExport<'a> {
    start_date: String,
    end_date: String,
    stats: &'a StatsSummary,
    by_model: Vec<BucketRow<'a>>,
    by_key: Vec<BucketRow<'a>>,
    records: &'a [UsageRecord],
}

fn bucket_rows<'a>(rows: Vec<(&'a str, &'a AggregateBucket)>) -> Vec<BucketRow<'a>> {
    rows.into_iter()
        .map(|(label, bucket)| BucketRow { label, bucket })
        .collect()
}

/// Export stats, both rollups and the raw records as pretty JSON
pub fn export_usage_to_json(
    stats: &StatsSummary,
    breakdown: &UsageBreakdown,
    records: &[UsageRecord],
    range: &DateRange,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let export = UsageExport {
        start_date: range.start_param(),
        end_date: range.end_param(),
        stats,
        by_model: bucket_rows(breakdown.by_model.sorted_by_cost()),
        by_key: bucket_rows(breakdown.by_key.sorted_by_count()),
        records,
    };

    let json =
        serde_json::to_string_pretty(&export).context("Failed to serialize usage to JSON")?;

    std::fs::write(path, json)
        .with_context(|| format!("Failed to write JSON file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 27).unwrap(),
        )
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 27)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn sample_records() -> Vec<UsageRecord> {
        vec![
            UsageRecord::new(json!({
                "model": "gpt-4", "cost": 1.5, "input_tokens": 100, "output_tokens": 50,
                "key_name": "ci", "duration_ms": 800
            })),
            UsageRecord::new(json!({
                "model": "gpt-4", "cost": 2.5, "input_tokens": 200, "output_tokens": 80,
                "api_key": {"name": "laptop"}, "duration_ms": 1600
            })),
            UsageRecord::new(json!({
                "model": "<script>", "total_cost": 0.1, "key_name": "ci"
            })),
        ]
    }

    fn render(stats: &StatsSummary, records: &[UsageRecord]) -> String {
        let breakdown = UsageBreakdown::from_records(records);
        render_report(stats, &breakdown, records.len(), &range(), timestamp()).unwrap()
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_large_number_thresholds() {
        assert_eq!(format_large_number(999), "999");
        assert_eq!(format_large_number(1_000), "1.00K");
        assert_eq!(format_large_number(1_500_000), "1.50M");
        assert_eq!(format_large_number(2_000_000_000), "2.00G");
        assert_eq!(format_large_number(3_250_000_000_000), "3.25T");
    }

    #[test]
    fn test_format_currency_and_duration() {
        assert_eq!(format_currency(4.0), "$4.0000");
        assert_eq!(format_currency(0.0), "$0.0000");
        assert_eq!(format_currency(12.5), "$12.5000");
        assert_eq!(format_duration_ms(Some(850.0)), "850ms");
        assert_eq!(format_duration_ms(Some(1250.0)), "1.25s");
        assert_eq!(format_duration_ms(None), "-");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_report_scenario() {
        let stats = StatsSummary::from_response(&json!({"total_requests": 42, "total_cost": 12.5}));
        let html = render(&stats, &sample_records());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Token Usage Report (2026-02-01 ~ 2026-02-27)</title>"));
        assert!(html.contains("<div class=\"stat-value\">42</div>"));
        assert!(html.contains("<div class=\"stat-value\">$12.5000</div>"));
        assert!(html.contains("<td class=\"cost-cell\">$4.0000</td>"));
        assert!(html.contains("<span class=\"model-badge\">gpt-4</span>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Generated by token-report | 2026-02-27 09:30:00"));
    }

    #[test]
    fn test_request_count_falls_back_to_records() {
        let html = render(&StatsSummary::default(), &sample_records());
        assert!(html.contains("<div class=\"stat-value\">3</div>"));
    }

    #[test]
    fn test_tables_are_presorted() {
        let html = render(&StatsSummary::default(), &sample_records());

        // Models by cost: gpt-4 ($4) before <script> ($0.1)
        let gpt4 = html.find("model-badge\">gpt-4").unwrap();
        let script = html.find("model-badge\">&lt;script&gt;").unwrap();
        assert!(gpt4 < script);

        // Keys by count: ci (2) before laptop (1)
        let ci = html.find("<td>ci</td>").unwrap();
        let laptop = html.find("<td>laptop</td>").unwrap();
        assert!(ci < laptop);
    }

    #[test]
    fn test_render_is_deterministic() {
        let stats = StatsSummary::from_response(&json!({"total_tokens": 1500}));
        let records = sample_records();
        assert_eq!(render(&stats, &records), render(&stats, &records));
    }

    #[test]
    fn test_empty_report() {
        let html = render(&StatsSummary::default(), &[]);
        assert_eq!(html.matches("No usage records in this range").count(), 2);
        assert!(html.contains("<div class=\"stat-value\">0</div>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_no_external_assets() {
        let html = render(&StatsSummary::default(), &sample_records());
        assert!(!html.contains("<link"));
        assert!(!html.contains("src="));
        assert!(!html.contains("http://"));
        assert!(!html.contains("https://"));
    }

    #[test]
    fn test_save_report_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/report.html");

        save_report("<html></html>", &path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
    }

    #[test]
    fn test_export_usage_to_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("usage.json");
        let records = sample_records();
        let breakdown = UsageBreakdown::from_records(&records);
        let stats = StatsSummary::from_response(&json!({"total_requests": 3}));

        export_usage_to_json(&stats, &breakdown, &records, &range(), &path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["start_date"], "2026-02-01");
        assert_eq!(parsed["stats"]["total_requests"], 3);
        assert_eq!(parsed["by_model"][0]["label"], "gpt-4");
        assert_eq!(parsed["by_model"][0]["count"], 2);
        assert_eq!(parsed["records"].as_array().unwrap().len(), 3);
        assert_eq!(parsed["records"][2]["model"], "<script>");
    }
}
