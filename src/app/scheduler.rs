//! Fixed-interval driver for the orchestrator.
//!
//! Cycles run back to back on one thread, so they can never overlap. A cycle
//! that overruns the interval delays the next one, which then starts at once.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::app::orchestrator::{CycleReport, Orchestrator};
use crate::io::Store;
use crate::report::AlertSink;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until the process is interrupted.
    pub fn run_forever<S: Store, A: AlertSink>(&self, orchestrator: &mut Orchestrator<S, A>) {
        info!(
            "Polling every {}s (Ctrl+C to stop)",
            self.interval.as_secs_f64()
        );
        self.run_until(orchestrator, |_| true);
    }

    /// Run one cycle immediately, then one per interval while `keep_going`
    /// returns true for the latest report. Returns the number of cycles run.
    pub fn run_until<S, A, F>(&self, orchestrator: &mut Orchestrator<S, A>, mut keep_going: F) -> usize
    where
        S: Store,
        A: AlertSink,
        F: FnMut(&CycleReport) -> bool,
    {
        let mut cycles = 0;
        loop {
            let started = Instant::now();
            let report = orchestrator.run_cycle();
            cycles += 1;
            if !keep_going(&report) {
                return cycles;
            }

            let elapsed = started.elapsed();
            match self.interval.checked_sub(elapsed) {
                Some(wait) if !wait.is_zero() => {
                    debug!("Next cycle in {:.1}s", wait.as_secs_f64());
                    thread::sleep(wait);
                }
                _ => debug!("Cycle overran the interval by {:?}", elapsed - self.interval),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Adapters, RawTable, SourceAdapter};
    use crate::domain::{CalendarRow, ClassificationResult, IndicatorDef, Series, SourceKind, Units};
    use crate::error::AppError;
    use crate::events::EventDetector;
    use crate::io::Registry;

    struct OnePoint;

    impl SourceAdapter for OnePoint {
        fn fetch(&self, _indicator: &IndicatorDef) -> RawTable {
            let mut table = RawTable::new(["DATE", "VALUE"]);
            table.push_row(vec!["2024-01-01".into(), "1.5".into()]);
            table
        }
    }

    #[derive(Default)]
    struct CountingStore {
        calendars: usize,
    }

    impl Store for CountingStore {
        fn save(&mut self, _indicator: &str, _series: &Series) -> Result<(), AppError> {
            Ok(())
        }

        fn save_calendar(&mut self, _rows: &[CalendarRow]) -> Result<(), AppError> {
            self.calendars += 1;
            Ok(())
        }
    }

    struct NoAlerts;

    impl AlertSink for NoAlerts {
        fn emit(&mut self, _result: &ClassificationResult) {
            panic!("no release expected");
        }
    }

    #[test]
    fn runs_immediately_then_until_predicate_stops() {
        let registry =
            Registry::new(vec![IndicatorDef::new("X", SourceKind::Fred, "X", Units::Lin)]).unwrap();
        let adapters = Adapters::new().with(SourceKind::Fred, OnePoint);
        let mut orch = Orchestrator::new(
            &registry,
            adapters,
            CountingStore::default(),
            NoAlerts,
            EventDetector::default(),
        )
        .unwrap();

        let scheduler = Scheduler::new(Duration::from_millis(1));
        let mut seen = Vec::new();
        let cycles = scheduler.run_until(&mut orch, |report| {
            seen.push(report.outcomes[0].1);
            seen.len() < 3
        });

        assert_eq!(cycles, 3);
        assert_eq!(orch.store().calendars, 3);
        assert!(matches!(seen[0], crate::app::orchestrator::IndicatorOutcome::Seeded(_)));
        assert_eq!(seen[1], crate::app::orchestrator::IndicatorOutcome::Unchanged);
    }

    #[test]
    fn single_cycle_when_predicate_declines() {
        let registry =
            Registry::new(vec![IndicatorDef::new("X", SourceKind::Fred, "X", Units::Lin)]).unwrap();
        let adapters = Adapters::new().with(SourceKind::Fred, OnePoint);
        let mut orch = Orchestrator::new(
            &registry,
            adapters,
            CountingStore::default(),
            NoAlerts,
            EventDetector::default(),
        )
        .unwrap();

        let started = Instant::now();
        let cycles = Scheduler::default().run_until(&mut orch, |_| false);
        assert_eq!(cycles, 1);
        assert!(started.elapsed() < DEFAULT_INTERVAL);
    }
}
