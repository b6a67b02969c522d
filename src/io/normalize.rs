//! Raw table → canonical series normalization.
//!
//! Turns whatever an adapter handed back into a clean `(date, value, indicator,
//! source)` series:
//! - **Case-insensitive schema**: `DATE`, `Value`, `date` all resolve
//! - **Row-level coercion**: rows with an unparsable date or value are dropped, never kept half-valid
//! - **Fail soft**: empty input or missing columns produce an empty series, not an error
//! - **Series invariant**: sorted ascending, one observation per date (last occurrence wins)

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, error, warn};

use crate::data::{RawCell, RawTable};
use crate::domain::{Observation, Series};

/// Normalize a raw provider table into a [`Series`]. Never fails.
pub fn normalize(raw: &RawTable, source: &str, indicator: &str) -> Series {
    if raw.is_empty() {
        warn!(indicator, source, "Received empty table");
        return Series::empty(indicator, source);
    }

    let header_map = build_header_map(&raw.columns);
    let (Some(&date_idx), Some(&value_idx)) = (header_map.get("date"), header_map.get("value")) else {
        error!(
            indicator,
            source,
            "Data missing required columns `date`/`value`. Found: {:?}",
            raw.columns
        );
        return Series::empty(indicator, source);
    };

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut dropped = 0usize;
    for row in &raw.rows {
        let date = row.get(date_idx).and_then(coerce_date);
        let value = row.get(value_idx).and_then(coerce_value);
        match (date, value) {
            (Some(date), Some(value)) => {
                by_date.insert(date, value);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(indicator, source, dropped, "dropped rows with invalid date or value");
    }

    Series {
        indicator: indicator.to_string(),
        source: source.to_string(),
        observations: by_date
            .into_iter()
            .map(|(date, value)| Observation::new(date, value))
            .collect(),
    }
}

fn build_header_map(columns: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in columns.iter().enumerate() {
        // First occurrence wins when two columns collide after lower-casing.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase()
}

fn coerce_date(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::Text(s) => parse_date(s.trim()),
        RawCell::Number(_) | RawCell::Missing => None,
    }
}

fn coerce_value(cell: &RawCell) -> Option<f64> {
    let v = match cell {
        RawCell::Number(v) => *v,
        RawCell::Text(s) => {
            let trimmed = s.trim();
            // FRED marks missing observations with a lone dot.
            if trimmed.is_empty() || trimmed == "." {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        RawCell::Missing => return None,
    };
    if v.is_finite() { Some(v) } else { None }
}

/// Parse the date shapes statistics providers actually emit.
///
/// Daily ISO dates are the norm; monthly (`2024-05`), quarterly (`2024-Q2`) and
/// annual (`2024`) periods map to the first day of the period. ISO date-times
/// keep only their date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let bytes = s.as_bytes();
    if bytes.len() > 10 && matches!(bytes[10], b'T' | b' ') {
        return NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok();
    }

    let year_part = s.get(..4)?;
    if !year_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;

    match s.get(4..)? {
        "" => NaiveDate::from_ymd_opt(year, 1, 1),
        rest => {
            if let Some(q) = rest.strip_prefix("-Q") {
                let quarter: u32 = q.parse().ok()?;
                if !(1..=4).contains(&quarter) {
                    return None;
                }
                return NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1);
            }
            let month = rest.strip_prefix('-')?;
            if month.len() != 2 {
                return None;
            }
            NaiveDate::from_ymd_opt(year, month.parse().ok()?, 1)
        }
    }
}
