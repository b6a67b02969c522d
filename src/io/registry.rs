//! Indicator registry: the fixed table of tracked indicators.
//!
//! The registry is data, not code. The built-in table below is used unless a
//! CSV with the same columns (`id,source,display_name,units`) is supplied.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{IndicatorDef, SourceKind, Units};
use crate::error::AppError;

const DEFAULT_TABLE: [(&str, SourceKind, &str, Units); 6] = [
    ("CPIAUCSL", SourceKind::Fred, "US CPI", Units::Pc1),
    ("PPIFIS", SourceKind::Fred, "US PPI", Units::Pc1),
    ("PAYEMS", SourceKind::Fred, "US NFP", Units::Chg),
    ("UNRATE", SourceKind::Fred, "US Unemployment", Units::Lin),
    ("CPALTT01GBM659N", SourceKind::Fred, "UK Inflation", Units::Lin),
    ("ICP/M.U2.N.000000.4.ANR", SourceKind::Ecb, "Eurozone Inflation", Units::Lin),
];

/// One CSV row. An absent or empty `units` cell means levels.
#[derive(Debug, Deserialize)]
struct RegistryRow {
    id: String,
    source: SourceKind,
    display_name: String,
    #[serde(default)]
    units: Option<Units>,
}

impl From<RegistryRow> for IndicatorDef {
    fn from(row: RegistryRow) -> Self {
        IndicatorDef {
            id: row.id,
            source: row.source,
            display_name: row.display_name,
            units: row.units.unwrap_or_default(),
        }
    }
}

/// Ordered, validated list of indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    indicators: Vec<IndicatorDef>,
}

impl Registry {
    /// Validate and wrap a list of indicators.
    ///
    /// Display names key the release state and the store, so they must be unique.
    pub fn new(indicators: Vec<IndicatorDef>) -> Result<Self, AppError> {
        if indicators.is_empty() {
            return Err(AppError::config("Indicator registry is empty."));
        }
        let mut seen = HashSet::new();
        for def in &indicators {
            if def.id.trim().is_empty() || def.display_name.trim().is_empty() {
                return Err(AppError::config(format!(
                    "Registry entry has an empty id or display_name: {def:?}"
                )));
            }
            if !seen.insert(def.display_name.as_str()) {
                return Err(AppError::config(format!(
                    "Duplicate indicator display_name in registry: {}",
                    def.display_name
                )));
            }
        }
        Ok(Self { indicators })
    }

    pub fn builtin() -> Self {
        Self {
            indicators: DEFAULT_TABLE
                .iter()
                .map(|&(id, source, name, units)| IndicatorDef::new(id, source, name, units))
                .collect(),
        }
    }

    /// Load from `path`, or fall back to the built-in table.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => Self::from_csv(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn from_csv(path: &Path) -> Result<Self, AppError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| AppError::config(format!("Failed to open registry '{}': {e}", path.display())))?;
        Self::from_reader(reader)
    }

    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, AppError> {
        let rows = reader
            .deserialize::<RegistryRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::config(format!("Invalid registry row: {e}")))?;
        Self::new(rows.into_iter().map(IndicatorDef::from).collect())
    }

    pub fn indicators(&self) -> &[IndicatorDef] {
        &self.indicators
    }

    pub fn sources(&self) -> HashSet<SourceKind> {
        self.indicators.iter().map(|d| d.source).collect()
    }

    /// Position of a display name in registry order (dashboard sorting).
    pub fn position(&self, display_name: &str) -> Option<usize> {
        self.indicators
            .iter()
            .position(|d| d.display_name.eq_ignore_ascii_case(display_name))
    }
}
