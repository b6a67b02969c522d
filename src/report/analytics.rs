//! Pure computations behind the dashboard.
//!
//! Nothing here touches the terminal; `crate::tui` only lays these values out.

use std::cmp::Ordering;

use chrono::{Months, NaiveDate};

use crate::domain::{Observation, Series};
use crate::io::Registry;
use crate::math::{moving_average, pearson, quantile, sample_std};

/// Observations in the trend line's moving average.
pub const TREND_WINDOW: usize = 12;
/// Years of history shown in the chart.
pub const CHART_YEARS: u32 = 10;

/// Market series that can be drawn over the selected indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayAsset {
    pub label: &'static str,
    /// FRED series id; `None` disables the overlay.
    pub series_id: Option<&'static str>,
}

pub const OVERLAY_ASSETS: [OverlayAsset; 7] = [
    OverlayAsset { label: "None", series_id: None },
    OverlayAsset { label: "S&P 500", series_id: Some("SP500") },
    OverlayAsset { label: "US 10Y Treasury Yield", series_id: Some("DGS10") },
    OverlayAsset { label: "USD Index (Broad)", series_id: Some("DTWEXBGS") },
    OverlayAsset { label: "GBP/USD", series_id: Some("DEXUSUK") },
    OverlayAsset { label: "EUR/USD", series_id: Some("DEXUSEU") },
    OverlayAsset { label: "Bitcoin", series_id: Some("CBBTCUSD") },
];

/// Payroll counts are published in thousands.
pub fn is_payroll_like(indicator: &str) -> bool {
    let upper = indicator.to_uppercase();
    upper.contains("NFP") || upper.contains("PAYROLL")
}

/// Payroll series as displayed: levels in thousands become plain counts.
/// Other series pass through unchanged.
pub fn scale_for_display(mut series: Series) -> Series {
    if is_payroll_like(&series.indicator) {
        for obs in &mut series.observations {
            obs.value *= 1000.0;
        }
    }
    series
}

/// Latest value and change for the snapshot strip.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub indicator: String,
    pub latest: f64,
    pub delta: Option<f64>,
    pub payroll_scaled: bool,
}

impl Snapshot {
    /// Expects a series already passed through [`scale_for_display`].
    pub fn of(series: &Series) -> Option<Self> {
        let n = series.len();
        let latest = series.latest()?.value;
        let previous = n.checked_sub(2).map(|i| series.observations[i].value);

        Some(Self {
            indicator: series.indicator.clone(),
            latest,
            delta: previous.map(|p| latest - p),
            payroll_scaled: is_payroll_like(&series.indicator),
        })
    }

    pub fn value_text(&self) -> String {
        if self.payroll_scaled {
            format!("{:.0}", self.latest)
        } else {
            format!("{:.2}", self.latest)
        }
    }

    pub fn delta_text(&self) -> String {
        match self.delta {
            Some(d) if self.payroll_scaled => format!("{d:+.0}"),
            Some(d) => format!("{d:+.2}"),
            None => "n/a".to_string(),
        }
    }
}

/// 12-month statistics of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub volatility: Option<f64>,
    pub high: f64,
    pub low: f64,
}

/// `months` before the latest observation, if the series has one.
fn cutoff(series: &Series, months: u32) -> Option<NaiveDate> {
    series.latest()?.date.checked_sub_months(Months::new(months))
}

/// Observations dated strictly after `latest - months`.
pub fn trailing_months(series: &Series, months: u32) -> &[Observation] {
    if series.is_empty() {
        return &[];
    }
    let Some(cutoff) = cutoff(series, months) else {
        return &series.observations;
    };
    let start = series.observations.partition_point(|o| o.date <= cutoff);
    &series.observations[start..]
}

/// Volatility, high and low over the trailing year; the whole series when the
/// year holds no observations.
pub fn window_stats(series: &Series) -> Option<WindowStats> {
    let window = trailing_months(series, 12);
    let window = if window.is_empty() { &series.observations[..] } else { window };
    if window.is_empty() {
        return None;
    }

    let values: Vec<f64> = window.iter().map(|o| o.value).collect();
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    Some(WindowStats {
        volatility: sample_std(&values),
        high,
        low,
    })
}

/// Carry the last known overlay value onto each target date.
///
/// `points` must be sorted by date. Dates before the first point get `None`.
pub fn forward_fill(targets: &[NaiveDate], points: &[(NaiveDate, f64)]) -> Vec<Option<f64>> {
    targets
        .iter()
        .map(|date| {
            let idx = points.partition_point(|(d, _)| d <= date);
            idx.checked_sub(1).map(|i| points[i].1)
        })
        .collect()
}

/// Pearson correlation between a macro series and an overlay forward-filled
/// onto the macro dates. `None` when fewer than two aligned pairs exist.
pub fn overlay_correlation(series: &Series, overlay: &[(NaiveDate, f64)]) -> Option<f64> {
    let dates: Vec<NaiveDate> = series.observations.iter().map(|o| o.date).collect();
    let filled = forward_fill(&dates, overlay);

    let (xs, ys): (Vec<f64>, Vec<f64>) = series
        .observations
        .iter()
        .zip(filled)
        .filter_map(|(o, y)| y.map(|y| (o.value, y)))
        .unzip();
    pearson(&xs, &ys)
}

pub fn format_correlation(corr: Option<f64>) -> String {
    corr.map(|c| format!("{c:.2}")).unwrap_or_else(|| "N/A".to_string())
}

/// The part of a series drawn in the chart: `latest - 10 years` through the
/// latest date, both ends included.
pub fn chart_window(series: &Series) -> &[Observation] {
    if series.is_empty() {
        return &[];
    }
    let Some(cutoff) = cutoff(series, CHART_YEARS * 12) else {
        return &series.observations;
    };
    let start = series.observations.partition_point(|o| o.date < cutoff);
    &series.observations[start..]
}

/// Y axis range: 1st to 99th percentile plus 10% padding on each side.
pub fn y_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let lo = quantile(values, 0.01)?;
    let hi = quantile(values, 0.99)?;
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.1
    } else if lo != 0.0 {
        lo.abs() * 0.1
    } else {
        1.0
    };
    Some((lo - pad, hi + pad))
}

/// Moving-average trend line over `window` as chart points.
pub fn trend_points(window: &[Observation]) -> Vec<(NaiveDate, f64)> {
    let values: Vec<f64> = window.iter().map(|o| o.value).collect();
    window
        .iter()
        .zip(moving_average(&values, TREND_WINDOW))
        .filter_map(|(o, ma)| ma.map(|v| (o.date, v)))
        .collect()
}

/// Map overlay values linearly onto `[lo, hi]` so they share the macro axis.
pub fn rescale_onto(points: &[(NaiveDate, f64)], lo: f64, hi: f64) -> Vec<(NaiveDate, f64)> {
    let min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    points
        .iter()
        .map(|&(d, v)| {
            let t = if span > 0.0 { (v - min) / span } else { 0.5 };
            (d, lo + t * (hi - lo))
        })
        .collect()
}

/// Order loaded series like the registry; unknown names go last, alphabetically.
pub fn order_by_registry(mut series: Vec<Series>, registry: &Registry) -> Vec<Series> {
    series.sort_by(|a, b| {
        let pa = registry.position(&a.indicator);
        let pb = registry.position(&b.indicator);
        match (pa, pb) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.indicator.cmp(&b.indicator),
        }
    });
    series
}

/// One line of the data log tab.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub date: NaiveDate,
    pub value: f64,
    pub indicator: String,
    pub source: String,
}

/// Every observation of every series, newest first; ties by indicator name.
pub fn data_log(series: &[Series]) -> Vec<LogRow> {
    let mut rows: Vec<LogRow> = series
        .iter()
        .flat_map(|s| {
            s.observations.iter().map(|o| LogRow {
                date: o.date,
                value: o.value,
                indicator: s.indicator.clone(),
                source: s.source.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.indicator.cmp(&b.indicator)));
    rows
}
