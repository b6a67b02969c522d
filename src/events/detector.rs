//! Surprise detection for the latest release of a series.
//!
//! The latest observation is compared with an expectation (an explicit
//! consensus, or the mean of the trailing baseline) and the difference is
//! scaled by the baseline's sample standard deviation:
//!
//! ```text
//! baseline = the lookback_window - 1 observations before the latest
//! surprise = actual - expected
//! z        = surprise / stdev(baseline)      (0 when stdev is 0)
//! ```

use crate::domain::{Analysis, Classification, ClassificationResult, Series};
use crate::error::AppError;
use crate::math::{mean, round_to, sample_std};

pub const DEFAULT_LOOKBACK_WINDOW: usize = 12;

/// `z` above this (or below its negative) is a large surprise.
pub const LARGE_SURPRISE_Z: f64 = 1.0;
/// `|z|` at or above this (and at most `LARGE_SURPRISE_Z`) is a moderate surprise.
pub const MODERATE_SURPRISE_Z: f64 = 0.3;

const UNKNOWN_INDICATOR: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDetector {
    lookback_window: usize,
}

impl Default for EventDetector {
    fn default() -> Self {
        Self {
            lookback_window: DEFAULT_LOOKBACK_WINDOW,
        }
    }
}

impl EventDetector {
    /// `lookback_window` counts the latest point, so it must leave at least one
    /// baseline observation.
    pub fn new(lookback_window: usize) -> Result<Self, AppError> {
        if lookback_window < 2 {
            return Err(AppError::config(format!(
                "Lookback window must be at least 2 (got {lookback_window})."
            )));
        }
        Ok(Self { lookback_window })
    }

    pub fn lookback_window(&self) -> usize {
        self.lookback_window
    }

    /// Classify the latest observation of `series`.
    ///
    /// Returns `Analysis::InsufficientHistory` when the series is shorter than
    /// the lookback window; callers must check before using any result field.
    pub fn analyze(&self, series: &Series, consensus_value: Option<f64>) -> Analysis {
        let n = series.len();
        if n < self.lookback_window {
            return Analysis::InsufficientHistory {
                have: n,
                need: self.lookback_window,
            };
        }

        let values = series.values();
        let latest = series.observations[n - 1];
        let baseline = &values[n - self.lookback_window..n - 1];

        let actual = latest.value;
        let expected = consensus_value
            .or_else(|| mean(baseline))
            .unwrap_or(actual);
        let surprise = actual - expected;

        // A single-point baseline has no spread; treat it like a flat one.
        let volatility = sample_std(baseline).unwrap_or(0.0);
        let z_score = if volatility == 0.0 { 0.0 } else { surprise / volatility };

        let indicator = if series.indicator.trim().is_empty() {
            UNKNOWN_INDICATOR.to_string()
        } else {
            series.indicator.clone()
        };

        Analysis::Release(ClassificationResult {
            date: latest.date,
            indicator,
            actual: round_to(actual, 2),
            expected: round_to(expected, 2),
            surprise: round_to(surprise, 3),
            z_score: round_to(z_score, 2),
            classification: classify(z_score),
        })
    }
}

/// Map an (unrounded) z-score to its class. The first matching rule wins.
pub fn classify(z_score: f64) -> Classification {
    if z_score > LARGE_SURPRISE_Z {
        Classification::LargePositive
    } else if z_score < -LARGE_SURPRISE_Z {
        Classification::LargeNegative
    } else if (MODERATE_SURPRISE_Z..=LARGE_SURPRISE_Z).contains(&z_score.abs()) {
        Classification::Moderate
    } else {
        Classification::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::{Months, NaiveDate};

    fn monthly(indicator: &str, values: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        Series {
            indicator: indicator.to_string(),
            source: "TEST".to_string(),
            observations: values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let date = start.checked_add_months(Months::new(i as u32)).unwrap();
                    Observation::new(date, *v)
                })
                .collect(),
        }
    }

    #[test]
    fn jump_after_quiet_history_is_large_positive() {
        let mut values = vec![3.0, 3.1, 2.9, 3.0, 3.05, 2.95, 3.0, 3.1, 2.9, 3.0, 3.0];
        values.push(3.8);
        let series = monthly("TEST_CPI", &values);

        let analysis = EventDetector::default().analyze(&series, Some(3.0));
        let result = analysis.release().expect("twelve points is enough history");

        assert_eq!(result.indicator, "TEST_CPI");
        assert_eq!(result.date, series.latest().unwrap().date);
        assert_eq!(result.actual, 3.8);
        assert_eq!(result.expected, 3.0);
        assert_eq!(result.surprise, 0.8);
        assert!(result.z_score > 1.0);
        assert_eq!(result.classification, Classification::LargePositive);
    }

    #[test]
    fn baseline_mean_is_used_without_consensus() {
        let mut values = vec![2.0, 4.0, 2.0, 4.0, 2.0, 4.0, 2.0, 4.0, 2.0, 4.0, 3.0];
        values.push(3.0);
        let series = monthly("X", &values);

        let result = EventDetector::default().analyze(&series, None);
        let result = result.release().unwrap();
        assert_eq!(result.expected, 3.0);
        assert_eq!(result.surprise, 0.0);
        assert_eq!(result.classification, Classification::Neutral);
    }

    #[test]
    fn short_series_reports_insufficient_history() {
        let detector = EventDetector::default();
        for n in 0..DEFAULT_LOOKBACK_WINDOW {
            let series = monthly("X", &vec![1.0; n]);
            assert_eq!(
                detector.analyze(&series, None),
                Analysis::InsufficientHistory { have: n, need: 12 }
            );
        }
    }

    #[test]
    fn flat_baseline_forces_zero_z_score() {
        let mut values = vec![2.0; 11];
        values.push(9.0);
        let series = monthly("FLAT", &values);

        let result = EventDetector::default().analyze(&series, None);
        let result = result.release().unwrap();
        assert_eq!(result.surprise, 7.0);
        assert_eq!(result.z_score, 0.0);
        assert_eq!(result.classification, Classification::Neutral);
    }

    #[test]
    fn short_window_covers_every_class() {
        // Baseline [1, 3]: mean 2, sample stdev sqrt(2).
        let detector = EventDetector::new(3).unwrap();
        let class_of = |latest: f64| {
            let series = monthly("X", &[1.0, 3.0, latest]);
            detector.analyze(&series, None).release().unwrap().classification
        };
        assert_eq!(class_of(4.0), Classification::LargePositive);
        assert_eq!(class_of(0.0), Classification::LargeNegative);
        assert_eq!(class_of(2.5), Classification::Moderate);
        assert_eq!(class_of(1.5), Classification::Moderate);
        assert_eq!(class_of(2.2), Classification::Neutral);
    }

    #[test]
    fn only_the_trailing_window_counts() {
        // Old volatile history outside the window must not matter.
        let detector = EventDetector::new(3).unwrap();
        let series = monthly("X", &[100.0, -50.0, 1.0, 3.0, 4.0]);
        let result = detector.analyze(&series, None);
        let result = result.release().unwrap();
        assert_eq!(result.expected, 2.0);
        assert_eq!(result.z_score, 1.41);
    }

    #[test]
    fn outputs_are_rounded_for_presentation() {
        let detector = EventDetector::new(3).unwrap();
        let series = monthly("", &[1.0, 3.0, 2.123456]);
        let result = detector.analyze(&series, Some(1.98765)).release().cloned().unwrap();
        assert_eq!(result.indicator, "Unknown");
        assert_eq!(result.actual, 2.12);
        assert_eq!(result.expected, 1.99);
        assert_eq!(result.surprise, 0.136);
        assert_eq!(result.z_score, 0.1);
    }

    #[test]
    fn exact_ties_round_to_even() {
        // Baseline [1, 3, 5]: mean 3, sample stdev exactly 2.
        let detector = EventDetector::new(4).unwrap();

        let result = detector.analyze(&monthly("X", &[1.0, 3.0, 5.0, 2.75]), None);
        let result = result.release().unwrap();
        assert_eq!(result.surprise, -0.25);
        assert_eq!(result.z_score, -0.12);
        assert_eq!(result.classification, Classification::Neutral);

        let result = detector.analyze(&monthly("X", &[1.0, 3.0, 5.0, 2.125]), None);
        let result = result.release().unwrap();
        assert_eq!(result.actual, 2.12);
        assert_eq!(result.surprise, -0.875);
        assert_eq!(result.z_score, -0.44);
        assert_eq!(result.classification, Classification::Moderate);
    }

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(1.01), Classification::LargePositive);
        assert_eq!(classify(1.0), Classification::Moderate);
        assert_eq!(classify(-1.0), Classification::Moderate);
        assert_eq!(classify(-1.2), Classification::LargeNegative);
        assert_eq!(classify(0.3), Classification::Moderate);
        assert_eq!(classify(-0.3), Classification::Moderate);
        assert_eq!(classify(0.29), Classification::Neutral);
        assert_eq!(classify(0.0), Classification::Neutral);
    }

    #[test]
    fn lookback_below_two_is_rejected() {
        assert!(EventDetector::new(1).is_err());
        assert!(EventDetector::new(0).is_err());
        assert_eq!(EventDetector::new(2).unwrap().lookback_window(), 2);
    }
}
