//! Plain-text summaries printed by the CLI.

use crate::app::orchestrator::CycleReport;
use crate::domain::CalendarRow;

/// One line per indicator plus a totals line.
pub fn format_cycle_summary(report: &CycleReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== mtrack cycle @ {} ===\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    ));

    let width = report
        .outcomes
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    for (name, outcome) in &report.outcomes {
        out.push_str(&format!("{name:<width$}  {outcome}\n"));
    }

    out.push_str(&format!(
        "alerts={} skipped={} calendar={}\n",
        report.alerts(),
        report.skipped(),
        if report.calendar_saved { "saved" } else { "FAILED" }
    ));
    out
}

/// Fixed-width release calendar table.
pub fn format_calendar(rows: &[CalendarRow]) -> String {
    let headers = ["Indicator", "Source", "Next Release", "Last Updated"];
    let cells: Vec<[&str; 4]> = rows
        .iter()
        .map(|r| {
            [
                r.indicator.as_str(),
                r.source.as_str(),
                r.next_release.as_str(),
                r.last_updated.as_str(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |cols: [&str; 4]| {
        let mut s = String::new();
        for (i, (cell, w)) in cols.iter().zip(widths).enumerate() {
            if i > 0 {
                s.push_str("  ");
            }
            s.push_str(&format!("{cell:<w$}"));
        }
        s.trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers));
    out.push('\n');
    for row in cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}
