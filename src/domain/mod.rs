//! Domain types used throughout the tracker.
//!
//! This module defines:
//!
//! - cleaned time series (`Observation`, `Series`)
//! - the indicator registry entry (`IndicatorDef`, `SourceKind`, `Units`)
//! - detector outputs (`Analysis`, `ClassificationResult`, `Classification`)
//! - release calendar values (`NextRelease`, `CalendarRow`)

pub mod types;

pub use types::*;
