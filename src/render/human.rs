//! Human-readable output: plain-text tables.

use std::fmt::Write;

use crate::core::models::{CallsReport, DataSource, DayCell, DayStats, StatsDate, StatsMatrix, Trunk, Window};
use crate::util::time::format_period_label;

/// Render a call listing with its per-number stats.
#[must_use]
pub fn render_calls(report: &CallsReport) -> String {
    let mut out = String::new();
    let source = report.source.map_or("-", |s| match s {
        DataSource::Cache => "cache",
        DataSource::Upstream => "upstream",
    });
    let _ = writeln!(out, "Calls {} (source: {source})", report.label);

    if let Some(error) = &report.error {
        let _ = writeln!(out, "Error [{}]: {}", error.code, error.message);
    }

    if report.records.is_empty() {
        out.push_str("No outbound calls.\n");
        return out;
    }

    out.push('\n');
    let _ = writeln!(
        out,
        "{:<17} {:<16} {:<24} {:<16} {:>7}",
        "Start", "Number", "Description", "Destination", "Billsec"
    );
    let _ = writeln!(out, "{:-<17} {:-<16} {:-<24} {:-<16} {:->7}", "", "", "", "", "");
    for record in &report.records {
        let _ = writeln!(
            out,
            "{:<17} {:<16} {:<24} {:<16} {:>7}",
            record.formatted_start,
            record.originating_number,
            truncate(&record.description, 24),
            record.destination_number,
            record.billed_seconds
        );
    }

    if !report.caller_stats.is_empty() {
        out.push('\n');
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:>6} {:>6} {:>7}",
            "Number", "Description", "Calls", ">45s", "%"
        );
        let _ = writeln!(out, "{:-<16} {:-<24} {:->6} {:->6} {:->7}", "", "", "", "", "");
        for stat in &report.caller_stats {
            let _ = writeln!(
                out,
                "{:<16} {:<24} {:>6} {:>6} {:>7.1}",
                stat.number,
                truncate(&stat.description, 24),
                stat.total_calls,
                stat.calls_over_threshold,
                stat.percentage_over_threshold
            );
        }
    }

    out
}

/// Render the trunk directory.
#[must_use]
pub fn render_trunks(trunks: &[Trunk]) -> String {
    if trunks.is_empty() {
        return "No trunks configured.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {}", "Number", "Description");
    let _ = writeln!(out, "{:-<16} {:-<24}", "", "");
    for trunk in trunks {
        let _ = writeln!(out, "{:<16} {}", trunk.number, trunk.description);
    }
    out
}

/// Render one day's stored stats.
#[must_use]
pub fn render_day(day: &DayStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Stats for {}", day.date.format("%d.%m.%Y"));

    if day.stats.is_empty() {
        out.push_str("No stats recorded.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<16} {:<24} {:>6} {:>6} {:>7}",
        "Number", "Description", "Calls", ">45s", "%"
    );
    let _ = writeln!(out, "{:-<16} {:-<24} {:->6} {:->6} {:->7}", "", "", "", "", "");
    for stat in &day.stats {
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:>6} {:>6} {:>7.1}",
            stat.number,
            truncate(&stat.description, 24),
            stat.total_calls,
            stat.calls_over_threshold,
            stat.percentage_over_threshold
        );
    }
    let _ = writeln!(
        out,
        "{:<16} {:<24} {:>6} {:>6}",
        "Total", "", day.total_calls, day.total_calls_over_threshold
    );
    out
}

/// Render the stored-dates list and the number × date matrix.
#[must_use]
pub fn render_overview(dates: &[StatsDate], matrix: &StatsMatrix) -> String {
    if dates.is_empty() {
        return "No stats recorded.\n".to_string();
    }

    let mut out = String::new();
    for date in dates {
        let _ = writeln!(
            out,
            "{}  {:>6} calls  ({})",
            date.date.format("%d.%m.%Y"),
            date.total_calls,
            format_period_label(date.window)
        );
    }

    out.push('\n');
    let _ = write!(out, "{:<16} {:<24}", "Number", "Description");
    for date in &matrix.dates {
        let _ = write!(out, " {:>10}", date.format("%d.%m"));
    }
    out.push('\n');

    for row in &matrix.rows {
        let _ = write!(
            out,
            "{:<16} {:<24}",
            row.number,
            truncate(&row.description, 24)
        );
        for cell in &row.cells {
            let _ = write!(out, " {:>10}", format_cell(cell.as_ref()));
        }
        out.push('\n');
    }
    out
}

/// Render the result of a cache clear.
#[must_use]
pub fn render_cache_cleared(removed: usize, window: Option<Window>) -> String {
    match window {
        Some(window) if removed > 0 => format!(
            "Forgot cached window {} ({}-{})\n",
            format_period_label(window),
            window.start,
            window.end
        ),
        Some(_) => "Window was not cached.\n".to_string(),
        None => format!("Forgot {removed} cached window(s).\n"),
    }
}

/// `calls/long`, or `-` when nothing was recorded.
fn format_cell(cell: Option<&DayCell>) -> String {
    cell.map_or_else(
        || "-".to_string(),
        |c| format!("{}/{}", c.total_calls, c.calls_over_threshold),
    )
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{CallerStat, MatrixRow};
    use chrono::NaiveDate;

    #[test]
    fn empty_report_says_so() {
        let report = CallsReport {
            window: Window::new(0, 600),
            label: "01.01.1970 00:00-00:10".to_string(),
            source: None,
            records: Vec::new(),
            caller_stats: Vec::new(),
            error: None,
        };
        let out = render_calls(&report);
        assert!(out.contains("No outbound calls."));
        assert!(out.contains("source: -"));
    }

    #[test]
    fn missing_matrix_cells_render_as_dash() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let matrix = StatsMatrix {
            dates: vec![date],
            rows: vec![MatrixRow {
                number: "74951234567".to_string(),
                description: "Main".to_string(),
                cells: vec![None],
            }],
        };
        let dates = [StatsDate {
            date,
            window: Window::new(0, 1),
            total_calls: 0,
        }];
        let out = render_overview(&dates, &matrix);
        assert!(out.lines().last().unwrap().trim_end().ends_with('-'));
    }

    #[test]
    fn day_view_includes_totals() {
        let day = DayStats {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            stats: vec![CallerStat {
                number: "74951234567".to_string(),
                description: String::new(),
                total_calls: 4,
                calls_over_threshold: 1,
                percentage_over_threshold: 25.0,
            }],
            total_calls: 4,
            total_calls_over_threshold: 1,
        };
        let out = render_day(&day);
        assert!(out.contains("02.01.2024"));
        assert!(out.lines().last().unwrap().starts_with("Total"));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
