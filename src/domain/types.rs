//! Shared domain types.
//!
//! These types are deliberately small so they can be:
//!
//! - passed between the normalizer, detector and orchestrator without copies of
//!   provider-specific payloads
//! - written to and read back from the CSV store
//! - rendered by the alert sink and the dashboard

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One datum of one indicator's time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A cleaned time series for one `(indicator, source)` pair.
///
/// Invariant (maintained by `io::normalize`): observations are strictly
/// increasing by date and every value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub indicator: String,
    pub source: String,
    pub observations: Vec<Observation>,
}

impl Series {
    /// Column order of the tabular form (CSV header, dashboard data log).
    pub const COLUMNS: [&'static str; 4] = ["date", "value", "indicator", "source"];

    /// An empty, schema-conformant series.
    pub fn empty(indicator: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            indicator: indicator.into(),
            source: source.into(),
            observations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// The most recent observation, if any.
    pub fn latest(&self) -> Option<&Observation> {
        self.observations.last()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }
}

/// Which source adapter serves an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "FRED", alias = "fred")]
    Fred,
    #[serde(rename = "ECB", alias = "ecb")]
    Ecb,
}

impl SourceKind {
    /// Label attached to normalized series and calendar rows.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Fred => "FRED",
            SourceKind::Ecb => "ECB",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// FRED data transformation codes.
///
/// Only the FRED adapter honours these; other providers publish a single
/// representation and ignore the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Levels (no transformation).
    #[default]
    Lin,
    /// Change.
    Chg,
    /// Change from a year ago.
    Ch1,
    /// Percent change.
    Pch,
    /// Percent change from a year ago.
    Pc1,
    /// Compounded annual rate of change.
    Pca,
    /// Continuously compounded rate of change.
    Cch,
    /// Continuously compounded annual rate of change.
    Cca,
    /// Natural log.
    Log,
}

impl Units {
    pub fn code(self) -> &'static str {
        match self {
            Units::Lin => "lin",
            Units::Chg => "chg",
            Units::Ch1 => "ch1",
            Units::Pch => "pch",
            Units::Pc1 => "pc1",
            Units::Pca => "pca",
            Units::Cch => "cch",
            Units::Cca => "cca",
            Units::Log => "log",
        }
    }
}

/// Static descriptor of a tracked indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorDef {
    /// Provider-specific series code (FRED series id, ECB `FLOW/KEY`).
    pub id: String,
    pub source: SourceKind,
    pub display_name: String,
    pub units: Units,
}

impl IndicatorDef {
    pub fn new(id: &str, source: SourceKind, display_name: &str, units: Units) -> Self {
        Self {
            id: id.to_string(),
            source,
            display_name: display_name.to_string(),
            units,
        }
    }
}

/// Surprise class of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    LargePositive,
    LargeNegative,
    /// `0.3 <= |z| <= 1.0`, either sign.
    Moderate,
    Neutral,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::LargePositive => "Large Positive Surprise",
            Classification::LargeNegative => "Large Negative Surprise",
            Classification::Moderate => "Moderate Surprise",
            Classification::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of analysing one release. Numeric fields are already rounded for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub date: NaiveDate,
    pub indicator: String,
    pub actual: f64,
    pub expected: f64,
    pub surprise: f64,
    pub z_score: f64,
    pub classification: Classification,
}

/// Detector output: either a classification or a report that the series is too short.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Release(ClassificationResult),
    InsufficientHistory { have: usize, need: usize },
}

impl Analysis {
    pub fn release(&self) -> Option<&ClassificationResult> {
        match self {
            Analysis::Release(result) => Some(result),
            Analysis::InsufficientHistory { .. } => None,
        }
    }
}

/// Best-effort scheduling hint for an indicator's next publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRelease {
    Date(NaiveDate),
    Unknown,
    PendingSchedule,
    EstimateOnly,
}

impl fmt::Display for NextRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextRelease::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            NextRelease::Unknown => f.write_str("Unknown"),
            NextRelease::PendingSchedule => f.write_str("Pending Schedule"),
            NextRelease::EstimateOnly => f.write_str("Estimate Only"),
        }
    }
}

/// One row of the persisted release calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRow {
    #[serde(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Next Release")]
    pub next_release: String,
    #[serde(rename = "Last Updated")]
    pub last_updated: String,
}
