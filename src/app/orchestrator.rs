//! One ingestion cycle across the registry.
//!
//! For each indicator, in registry order:
//! fetch -> normalize -> persist -> release check -> (detector -> alert sink)
//!
//! then the release calendar is refreshed. A failing indicator never blocks
//! the others, and nothing in a cycle is fatal.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::data::Adapters;
use crate::domain::{Analysis, CalendarRow, IndicatorDef, SourceKind};
use crate::error::AppError;
use crate::events::EventDetector;
use crate::io::{Registry, Store, normalize};
use crate::report::AlertSink;

const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Last seen release date per indicator display name.
///
/// An indicator with no entry has never been ingested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseState {
    last_seen: HashMap<String, NaiveDate>,
}

impl ReleaseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State that already knows some indicators (restarts, tests).
    pub fn seeded<S: Into<String>>(entries: impl IntoIterator<Item = (S, NaiveDate)>) -> Self {
        Self {
            last_seen: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, indicator: &str) -> Option<NaiveDate> {
        self.last_seen.get(indicator).copied()
    }

    pub fn set(&mut self, indicator: &str, date: NaiveDate) {
        self.last_seen.insert(indicator.to_string(), date);
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

/// What happened to one indicator during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorOutcome {
    /// The fetch produced no usable rows.
    Skipped,
    /// The store rejected the series; state was left alone.
    PersistFailed,
    /// First successful ingestion; the latest date was recorded without an alert.
    Seeded(NaiveDate),
    Unchanged,
    /// A newer observation was classified and emitted.
    Released(NaiveDate),
    /// A newer observation arrived but the series is shorter than the lookback window.
    InsufficientHistory(NaiveDate),
}

impl fmt::Display for IndicatorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorOutcome::Skipped => f.write_str("skipped (no data)"),
            IndicatorOutcome::PersistFailed => f.write_str("skipped (store error)"),
            IndicatorOutcome::Seeded(d) => write!(f, "seeded at {d}"),
            IndicatorOutcome::Unchanged => f.write_str("unchanged"),
            IndicatorOutcome::Released(d) => write!(f, "release {d}"),
            IndicatorOutcome::InsufficientHistory(d) => write!(f, "release {d} (insufficient history)"),
        }
    }
}

/// Summary of one `run_cycle` call.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Local>,
    pub outcomes: Vec<(String, IndicatorOutcome)>,
    pub calendar_saved: bool,
}

impl CycleReport {
    pub fn alerts(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, IndicatorOutcome::Released(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, IndicatorOutcome::Skipped | IndicatorOutcome::PersistFailed))
            .count()
    }

    pub fn outcome(&self, indicator: &str) -> Option<IndicatorOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == indicator)
            .map(|(_, o)| *o)
    }
}

pub struct Orchestrator<S: Store, A: AlertSink> {
    indicators: Vec<IndicatorDef>,
    adapters: Adapters,
    store: S,
    sink: A,
    detector: EventDetector,
    state: ReleaseState,
}

impl<S: Store, A: AlertSink> Orchestrator<S, A> {
    /// Bind every registry entry to its adapter.
    ///
    /// A source kind without an adapter is a startup error.
    pub fn new(
        registry: &Registry,
        adapters: Adapters,
        store: S,
        sink: A,
        detector: EventDetector,
    ) -> Result<Self, AppError> {
        let mut missing: Vec<SourceKind> = registry
            .sources()
            .into_iter()
            .filter(|kind| !adapters.contains(*kind))
            .collect();
        if !missing.is_empty() {
            missing.sort_by_key(|k| k.label());
            let names: Vec<&str> = missing.iter().map(|k| k.label()).collect();
            return Err(AppError::config(format!(
                "No source adapter registered for: {}",
                names.join(", ")
            )));
        }

        Ok(Self {
            indicators: registry.indicators().to_vec(),
            adapters,
            store,
            sink,
            detector,
            state: ReleaseState::new(),
        })
    }

    /// Replace the release state (e.g. carry it over from an earlier run).
    pub fn with_state(mut self, state: ReleaseState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &ReleaseState {
        &self.state
    }

    pub fn into_state(self) -> ReleaseState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    pub fn indicators(&self) -> &[IndicatorDef] {
        &self.indicators
    }

    /// Run one full cycle: every indicator, then the calendar.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started_at = Local::now();
        info!("Starting ingestion cycle for {} indicators", self.indicators.len());

        let mut outcomes = Vec::with_capacity(self.indicators.len());
        for i in 0..self.indicators.len() {
            let outcome = self.process(i);
            debug!(indicator = %self.indicators[i].display_name, %outcome, "Indicator processed");
            outcomes.push((self.indicators[i].display_name.clone(), outcome));
        }

        let calendar_saved = match self.update_calendar() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to update release calendar: {e}");
                false
            }
        };

        let report = CycleReport {
            started_at,
            outcomes,
            calendar_saved,
        };
        info!(
            alerts = report.alerts(),
            skipped = report.skipped(),
            "Cycle complete"
        );
        report
    }

    fn process(&mut self, index: usize) -> IndicatorOutcome {
        let def = &self.indicators[index];
        let name = def.display_name.as_str();

        // Adapters are checked in `new`.
        let Some(adapter) = self.adapters.get(def.source) else {
            error!(indicator = name, "No adapter for source {}", def.source);
            return IndicatorOutcome::Skipped;
        };

        let raw = adapter.fetch(def);
        let series = normalize(&raw, def.source.label(), name);
        let Some(latest) = series.latest().map(|o| o.date) else {
            warn!(indicator = name, "No data after normalization; skipping");
            return IndicatorOutcome::Skipped;
        };

        if let Err(e) = self.store.save(name, &series) {
            error!(indicator = name, "Failed to persist series: {e}");
            return IndicatorOutcome::PersistFailed;
        }

        let Some(last_seen) = self.state.get(name) else {
            info!(indicator = name, %latest, "Initialized tracking");
            self.state.set(name, latest);
            return IndicatorOutcome::Seeded(latest);
        };

        if latest <= last_seen {
            return IndicatorOutcome::Unchanged;
        }

        info!(indicator = name, %latest, "New release detected");
        let outcome = match self.detector.analyze(&series, None) {
            Analysis::Release(result) => {
                self.sink.emit(&result);
                IndicatorOutcome::Released(latest)
            }
            Analysis::InsufficientHistory { have, need } => {
                warn!(
                    indicator = name,
                    have, need, "Not enough history to classify release"
                );
                IndicatorOutcome::InsufficientHistory(latest)
            }
        };
        self.state.set(name, latest);
        outcome
    }

    /// Rebuild the release calendar from each adapter's next-release lookup.
    pub fn update_calendar(&mut self) -> Result<(), AppError> {
        let last_updated = Local::now().format(LAST_UPDATED_FORMAT).to_string();

        let rows: Vec<CalendarRow> = self
            .indicators
            .iter()
            .map(|def| {
                let next = self
                    .adapters
                    .get(def.source)
                    .map(|a| a.next_release(def).to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                CalendarRow {
                    indicator: def.display_name.clone(),
                    source: def.source.label().to_string(),
                    next_release: next,
                    last_updated: last_updated.clone(),
                }
            })
            .collect();

        self.store.save_calendar(&rows)?;
        info!("Release calendar updated ({} rows)", rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RawTable, SourceAdapter};
    use crate::domain::{Classification, ClassificationResult, NextRelease, Series, Units};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Adapter whose tables can be swapped between cycles.
    #[derive(Clone, Default)]
    struct ScriptedAdapter {
        tables: Rc<RefCell<HashMap<String, RawTable>>>,
    }

    impl ScriptedAdapter {
        fn set(&self, id: &str, points: &[(&str, f64)]) {
            let mut table = RawTable::new(["date", "value"]);
            for (date, value) in points {
                table.push_row(vec![(*date).into(), (*value).into()]);
            }
            self.tables.borrow_mut().insert(id.to_string(), table);
        }
    }

    impl SourceAdapter for ScriptedAdapter {
        fn fetch(&self, indicator: &IndicatorDef) -> RawTable {
            self.tables
                .borrow()
                .get(&indicator.id)
                .cloned()
                .unwrap_or_else(RawTable::empty)
        }

        fn next_release(&self, indicator: &IndicatorDef) -> NextRelease {
            if indicator.id == "A" {
                NextRelease::Date(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap())
            } else {
                NextRelease::Unknown
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        series: HashMap<String, Series>,
        calendar: Option<Vec<CalendarRow>>,
        saves: usize,
        fail_for: HashSet<String>,
        fail_calendar: bool,
    }

    impl Store for MemoryStore {
        fn save(&mut self, indicator: &str, series: &Series) -> Result<(), AppError> {
            if self.fail_for.contains(indicator) {
                return Err(AppError::io("disk full"));
            }
            self.saves += 1;
            self.series.insert(indicator.to_string(), series.clone());
            Ok(())
        }

        fn save_calendar(&mut self, rows: &[CalendarRow]) -> Result<(), AppError> {
            if self.fail_calendar {
                return Err(AppError::io("calendar locked"));
            }
            self.calendar = Some(rows.to_vec());
            Ok(())
        }
    }

    impl AlertSink for Vec<ClassificationResult> {
        fn emit(&mut self, result: &ClassificationResult) {
            self.push(result.clone());
        }
    }

    fn registry() -> Registry {
        Registry::new(vec![
            IndicatorDef::new("A", SourceKind::Fred, "Alpha", Units::Lin),
            IndicatorDef::new("B", SourceKind::Fred, "Beta", Units::Lin),
        ])
        .unwrap()
    }

    fn orchestrator(
        adapter: &ScriptedAdapter,
        store: MemoryStore,
    ) -> Orchestrator<MemoryStore, Vec<ClassificationResult>> {
        let adapters = Adapters::new().with(SourceKind::Fred, adapter.clone());
        Orchestrator::new(
            &registry(),
            adapters,
            store,
            Vec::new(),
            EventDetector::new(3).unwrap(),
        )
        .unwrap()
    }

    const HISTORY: [(&str, f64); 3] = [("2024-01-01", 1.0), ("2024-02-01", 3.0), ("2024-03-01", 2.0)];

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn seed_then_unchanged_then_exactly_one_alert() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        let mut orch = orchestrator(&adapter, MemoryStore::default());

        let first = orch.run_cycle();
        assert_eq!(first.outcome("Alpha"), Some(IndicatorOutcome::Seeded(date("2024-03-01"))));
        assert!(orch.sink().is_empty());

        let second = orch.run_cycle();
        assert_eq!(second.outcome("Alpha"), Some(IndicatorOutcome::Unchanged));
        assert!(orch.sink().is_empty());

        let mut grown = HISTORY.to_vec();
        grown.push(("2024-04-01", 4.5));
        adapter.set("A", &grown);

        let third = orch.run_cycle();
        assert_eq!(third.outcome("Alpha"), Some(IndicatorOutcome::Released(date("2024-04-01"))));
        assert_eq!(third.alerts(), 1);
        assert_eq!(orch.sink().len(), 1);
        assert_eq!(orch.sink()[0].indicator, "Alpha");
        assert_eq!(orch.sink()[0].date, date("2024-04-01"));
        assert_eq!(orch.sink()[0].classification, Classification::LargePositive);

        let fourth = orch.run_cycle();
        assert_eq!(fourth.outcome("Alpha"), Some(IndicatorOutcome::Unchanged));
        assert_eq!(orch.sink().len(), 1);
        assert_eq!(orch.state().get("Alpha"), Some(date("2024-04-01")));
    }

    #[test]
    fn empty_fetch_skips_without_touching_state() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        let mut orch = orchestrator(&adapter, MemoryStore::default());

        let report = orch.run_cycle();
        assert_eq!(report.outcome("Beta"), Some(IndicatorOutcome::Skipped));
        assert_eq!(report.outcome("Alpha"), Some(IndicatorOutcome::Seeded(date("2024-03-01"))));
        assert_eq!(report.skipped(), 1);
        assert_eq!(orch.state().get("Beta"), None);
        assert!(!orch.store().series.contains_key("Beta"));
    }

    #[test]
    fn failure_early_in_registry_order_does_not_block_later_indicators() {
        // Alpha comes first in the registry and yields nothing.
        let adapter = ScriptedAdapter::default();
        adapter.set("B", &HISTORY);
        let mut orch = orchestrator(&adapter, MemoryStore::default());

        let report = orch.run_cycle();
        assert_eq!(report.outcomes[0], ("Alpha".to_string(), IndicatorOutcome::Skipped));
        assert_eq!(
            report.outcomes[1],
            ("Beta".to_string(), IndicatorOutcome::Seeded(date("2024-03-01")))
        );
        assert_eq!(orch.state().get("Alpha"), None);
        assert_eq!(orch.state().get("Beta"), Some(date("2024-03-01")));
        assert!(!orch.store().series.contains_key("Alpha"));
        assert_eq!(orch.store().series["Beta"].len(), 3);

        let mut grown = HISTORY.to_vec();
        grown.push(("2024-04-01", 4.5));
        adapter.set("B", &grown);
        let report = orch.run_cycle();
        assert_eq!(report.outcome("Alpha"), Some(IndicatorOutcome::Skipped));
        assert_eq!(report.outcome("Beta"), Some(IndicatorOutcome::Released(date("2024-04-01"))));
        assert_eq!(orch.sink().len(), 1);
        assert_eq!(orch.sink()[0].indicator, "Beta");
    }

    #[test]
    fn persistence_happens_on_the_seeding_cycle() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        adapter.set("B", &HISTORY);
        let mut orch = orchestrator(&adapter, MemoryStore::default());

        orch.run_cycle();
        let stored = &orch.store().series["Alpha"];
        assert_eq!(stored.len(), 3);
        assert_eq!(stored.source, "FRED");
        assert_eq!(stored.indicator, "Alpha");
        assert_eq!(orch.store().saves, 2);

        orch.run_cycle();
        assert_eq!(orch.store().saves, 4);
    }

    #[test]
    fn store_failure_skips_only_that_indicator() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        adapter.set("B", &HISTORY);
        let store = MemoryStore {
            fail_for: HashSet::from(["Alpha".to_string()]),
            ..MemoryStore::default()
        };
        let mut orch = orchestrator(&adapter, store);

        let report = orch.run_cycle();
        assert_eq!(report.outcome("Alpha"), Some(IndicatorOutcome::PersistFailed));
        assert_eq!(report.outcome("Beta"), Some(IndicatorOutcome::Seeded(date("2024-03-01"))));
        assert_eq!(orch.state().get("Alpha"), None);
        assert!(report.calendar_saved);
    }

    #[test]
    fn calendar_failure_keeps_saved_series() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        let store = MemoryStore {
            fail_calendar: true,
            ..MemoryStore::default()
        };
        let mut orch = orchestrator(&adapter, store);

        let report = orch.run_cycle();
        assert!(!report.calendar_saved);
        assert!(orch.store().series.contains_key("Alpha"));
        assert_eq!(orch.state().get("Alpha"), Some(date("2024-03-01")));
    }

    #[test]
    fn calendar_has_one_row_per_indicator() {
        let adapter = ScriptedAdapter::default();
        let mut orch = orchestrator(&adapter, MemoryStore::default());
        orch.update_calendar().unwrap();

        let rows = orch.store().calendar.clone().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].indicator, "Alpha");
        assert_eq!(rows[0].source, "FRED");
        assert_eq!(rows[0].next_release, "2025-03-12");
        assert_eq!(rows[1].next_release, "Unknown");
        assert_eq!(rows[0].last_updated.len(), "2025-03-01 09:00".len());
    }

    #[test]
    fn pre_seeded_state_alerts_on_first_cycle() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        let state = ReleaseState::seeded([("Alpha", date("2024-02-01"))]);
        let mut orch = orchestrator(&adapter, MemoryStore::default()).with_state(state);

        let report = orch.run_cycle();
        assert_eq!(report.outcome("Alpha"), Some(IndicatorOutcome::Released(date("2024-03-01"))));
        assert_eq!(orch.sink().len(), 1);
        assert_eq!(orch.sink()[0].classification, Classification::Neutral);

        let state = orch.into_state();
        assert_eq!(state.get("Alpha"), Some(date("2024-03-01")));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn short_history_release_advances_without_alert() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY[..2]);
        let state = ReleaseState::seeded([("Alpha", date("2024-01-01"))]);
        let mut orch = orchestrator(&adapter, MemoryStore::default()).with_state(state);

        let report = orch.run_cycle();
        assert_eq!(
            report.outcome("Alpha"),
            Some(IndicatorOutcome::InsufficientHistory(date("2024-02-01")))
        );
        assert!(orch.sink().is_empty());
        assert_eq!(orch.state().get("Alpha"), Some(date("2024-02-01")));
    }

    #[test]
    fn older_latest_date_is_not_a_release() {
        let adapter = ScriptedAdapter::default();
        adapter.set("A", &HISTORY);
        let state = ReleaseState::seeded([("Alpha", date("2024-06-01"))]);
        let mut orch = orchestrator(&adapter, MemoryStore::default()).with_state(state);

        let report = orch.run_cycle();
        assert_eq!(report.outcome("Alpha"), Some(IndicatorOutcome::Unchanged));
        assert_eq!(orch.state().get("Alpha"), Some(date("2024-06-01")));
    }

    #[test]
    fn missing_adapter_is_a_startup_error() {
        let registry = Registry::new(vec![IndicatorDef::new(
            "ICP/M.U2.N.000000.4.ANR",
            SourceKind::Ecb,
            "Eurozone Inflation",
            Units::Lin,
        )])
        .unwrap();
        let adapters = Adapters::new().with(SourceKind::Fred, ScriptedAdapter::default());
        let err = Orchestrator::new(
            &registry,
            adapters,
            MemoryStore::default(),
            Vec::<ClassificationResult>::new(),
            EventDetector::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
        assert!(err.message().contains("ECB"));
    }
}
