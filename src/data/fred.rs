//! FRED API integration: series observations and the release calendar.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::data::{RawCell, RawTable, SourceAdapter};
use crate::domain::{IndicatorDef, NextRelease, Units};
use crate::error::AppError;

const BASE_URL: &str = "https://api.stlouisfed.org/fred";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CALENDAR_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct FredClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FredClient {
    /// Build a client from `FRED_API_KEY` (a `.env` file is honoured).
    ///
    /// A missing key is not fatal: the client warns once here and then serves
    /// empty tables without touching the network.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FRED_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self::new(api_key)
    }

    pub fn new(api_key: Option<String>) -> Result<Self, AppError> {
        if api_key.is_none() {
            warn!("No FRED_API_KEY found (.env or environment); FRED indicators will stay empty.");
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build FRED HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch a series as raw `date`/`value` text columns.
    pub fn fetch_table(&self, series_id: &str, units: Units) -> Result<RawTable, AppError> {
        let observations = self.fetch_observations(series_id, units)?;
        Ok(observations_to_table(observations))
    }

    /// Fetch a level series as parsed `(date, value)` pairs (used for dashboard overlays).
    pub fn fetch_points(&self, series_id: &str) -> Result<Vec<(NaiveDate, f64)>, AppError> {
        let observations = self.fetch_observations(series_id, Units::Lin)?;
        let mut out: Vec<(NaiveDate, f64)> = observations
            .into_iter()
            .filter_map(|obs| {
                let value = parse_value(&obs.value)?;
                let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").ok()?;
                Some((date, value))
            })
            .collect();
        out.sort_by_key(|(d, _)| *d);
        Ok(out)
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::config("Missing FRED_API_KEY in environment (.env)."))
    }

    fn fetch_observations(&self, series_id: &str, units: Units) -> Result<Vec<Observation>, AppError> {
        let api_key = self.api_key()?;
        let resp = self
            .client
            .get(format!("{}/series/observations", self.base_url))
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("units", units.code()),
            ])
            .send()
            .map_err(|e| AppError::io(format!("FRED request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::io(format!(
                "FRED request failed with status {}.",
                resp.status()
            )));
        }

        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| AppError::io(format!("Failed to parse FRED response: {e}")))?;
        Ok(body.observations)
    }

    fn release_id(&self, series_id: &str) -> Result<Option<u64>, AppError> {
        let api_key = self.api_key()?;
        let resp = self
            .client
            .get(format!("{}/series/release", self.base_url))
            .timeout(CALENDAR_TIMEOUT)
            .query(&[("series_id", series_id), ("api_key", api_key), ("file_type", "json")])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::io(format!("FRED release lookup failed: {e}")))?;

        let body: ReleasesResponse = resp
            .json()
            .map_err(|e| AppError::io(format!("Failed to parse FRED release response: {e}")))?;
        Ok(body.releases.first().map(|r| r.id))
    }

    fn release_dates(&self, release_id: u64, today: NaiveDate) -> Result<Vec<String>, AppError> {
        let api_key = self.api_key()?;
        let release_id = release_id.to_string();
        let today = today.format("%Y-%m-%d").to_string();
        let resp = self
            .client
            .get(format!("{}/release/dates", self.base_url))
            .timeout(CALENDAR_TIMEOUT)
            .query(&[
                ("release_id", release_id.as_str()),
                ("api_key", api_key),
                ("file_type", "json"),
                // Future dates are only listed when this flag is set.
                ("include_release_dates_with_no_data", "true"),
                ("realtime_start", today.as_str()),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::io(format!("FRED release dates lookup failed: {e}")))?;

        let body: ReleaseDatesResponse = resp
            .json()
            .map_err(|e| AppError::io(format!("Failed to parse FRED release dates: {e}")))?;
        Ok(body.release_dates.into_iter().map(|d| d.date).collect())
    }
}

impl SourceAdapter for FredClient {
    fn fetch(&self, indicator: &IndicatorDef) -> RawTable {
        if !self.has_api_key() {
            debug!(series = %indicator.id, "skipping FRED fetch without API key");
            return RawTable::empty();
        }
        match self.fetch_table(&indicator.id, indicator.units) {
            Ok(table) => table,
            Err(e) => {
                error!(series = %indicator.id, "Data request failed: {e}");
                RawTable::empty()
            }
        }
    }

    fn next_release(&self, indicator: &IndicatorDef) -> NextRelease {
        if !self.has_api_key() {
            return NextRelease::Unknown;
        }

        let today = Local::now().date_naive();
        let lookup = self.release_id(&indicator.id).and_then(|id| match id {
            None => Ok(None),
            Some(id) => self.release_dates(id, today).map(Some),
        });

        match lookup {
            Ok(None) => NextRelease::Unknown,
            Ok(Some(dates)) => earliest_future_release(&dates, today),
            Err(e) => {
                warn!(series = %indicator.id, "Calendar fetch failed: {e}");
                NextRelease::EstimateOnly
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ReleaseDatesResponse {
    #[serde(default)]
    release_dates: Vec<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    date: String,
}

/// Raw text columns; coercion (including FRED's `.` missing marker) is left to the normalizer.
fn observations_to_table(observations: Vec<Observation>) -> RawTable {
    let mut table = RawTable::new(["date", "value"]);
    for obs in observations {
        table.push_row(vec![RawCell::Text(obs.date), RawCell::Text(obs.value)]);
    }
    table
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Earliest listed date on or after `today`; `PendingSchedule` when none is listed.
pub fn earliest_future_release(dates: &[String], today: NaiveDate) -> NextRelease {
    dates
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .filter(|d| *d >= today)
        .min()
        .map(NextRelease::Date)
        .unwrap_or(NextRelease::PendingSchedule)
}
