//! Source adapters: one implementation per statistics provider.
//!
//! Adapters hand back a loosely typed [`RawTable`]; turning it into a
//! [`Series`](crate::domain::Series) is the normalizer's job. An adapter must
//! never fail past its own boundary: network, HTTP and parse problems are
//! logged and degrade to an empty table.

use std::collections::HashMap;

use crate::domain::{IndicatorDef, NextRelease, SourceKind};

pub mod ecb;
pub mod fred;

pub use ecb::EcbClient;
pub use fred::FredClient;

/// A single raw cell as delivered by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Number(f64),
    Missing,
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::Text(value.to_string())
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        RawCell::Text(value)
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl<T: Into<RawCell>> From<Option<T>> for RawCell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawCell::Missing)
    }
}

/// Column-named rows of raw cells. Column names keep the provider's casing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// A table with no columns and no rows (the "failed fetch" value).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, row: Vec<RawCell>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Capability interface of a statistics provider.
pub trait SourceAdapter {
    /// Fetch the full history of one indicator. Failures yield an empty table.
    fn fetch(&self, indicator: &IndicatorDef) -> RawTable;

    /// Next scheduled publication. Providers without a calendar API return
    /// `EstimateOnly`.
    fn next_release(&self, _indicator: &IndicatorDef) -> NextRelease {
        NextRelease::EstimateOnly
    }
}

/// Adapters keyed by the registry's source kind.
#[derive(Default)]
pub struct Adapters {
    by_kind: HashMap<SourceKind, Box<dyn SourceAdapter>>,
}

impl Adapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: SourceKind, adapter: impl SourceAdapter + 'static) -> Self {
        self.insert(kind, Box::new(adapter));
        self
    }

    pub fn insert(&mut self, kind: SourceKind, adapter: Box<dyn SourceAdapter>) {
        self.by_kind.insert(kind, adapter);
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    pub fn get(&self, kind: SourceKind) -> Option<&dyn SourceAdapter> {
        self.by_kind.get(&kind).map(|a| a.as_ref())
    }
}
