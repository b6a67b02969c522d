//! Durable storage of cleaned series and the release calendar.
//!
//! The orchestrator only sees the [`Store`] trait. [`CsvStore`] keeps one CSV
//! per indicator plus `calendar.csv` in a single directory; every save is a
//! full overwrite (written to a temporary file, then renamed into place).

use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{RawCell, RawTable};
use crate::domain::{CalendarRow, Series};
use crate::error::AppError;
use crate::io::normalize::normalize;

pub const CALENDAR_FILE: &str = "calendar.csv";

/// Persistence interface consumed by the orchestrator.
pub trait Store {
    /// Replace the stored series of `indicator`.
    fn save(&mut self, indicator: &str, series: &Series) -> Result<(), AppError>;

    /// Replace the release calendar table.
    fn save_calendar(&mut self, rows: &[CalendarRow]) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::config(format!("Failed to create data dir '{}': {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn series_path(&self, indicator: &str) -> PathBuf {
        self.dir.join(series_file_name(indicator))
    }

    pub fn calendar_path(&self) -> PathBuf {
        self.dir.join(CALENDAR_FILE)
    }

    /// Load every stored series (all `*.csv` except the calendar), sorted by file name.
    pub fn load_all(&self) -> Result<Vec<Series>, AppError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AppError::io(format!("Failed to read data dir '{}': {e}", self.dir.display()))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .filter(|p| p.file_name().is_some_and(|name| name != CALENDAR_FILE))
            .collect();
        paths.sort();

        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let series = load_series(&path)?;
            if !series.is_empty() {
                out.push(series);
            }
        }
        Ok(out)
    }

    /// Load the calendar table; `None` when it has not been written yet.
    pub fn load_calendar(&self) -> Result<Option<Vec<CalendarRow>>, AppError> {
        let path = self.calendar_path();
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
        let rows = reader
            .deserialize::<CalendarRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::io(format!("Invalid calendar CSV '{}': {e}", path.display())))?;
        Ok(Some(rows))
    }

    fn write_atomically(
        &self,
        path: &Path,
        write: impl FnOnce(&mut csv::Writer<fs::File>) -> Result<(), csv::Error>,
    ) -> Result<(), AppError> {
        let tmp = path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp)
            .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", tmp.display())))?;

        let written = write(&mut writer)
            .map_err(|e| AppError::io(format!("Failed to write '{}': {e}", tmp.display())))
            .and_then(|_| {
                writer
                    .flush()
                    .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", tmp.display())))
            });
        drop(writer);

        // A failed save must not leave a partial temp file next to the series.
        let result = written.and_then(|_| {
            fs::rename(&tmp, path)
                .map_err(|e| AppError::io(format!("Failed to replace '{}': {e}", path.display())))
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl Store for CsvStore {
    fn save(&mut self, indicator: &str, series: &Series) -> Result<(), AppError> {
        let path = self.series_path(indicator);
        self.write_atomically(&path, |w| {
            w.write_record(Series::COLUMNS)?;
            for obs in &series.observations {
                w.write_record([
                    obs.date.format("%Y-%m-%d").to_string(),
                    obs.value.to_string(),
                    series.indicator.clone(),
                    series.source.clone(),
                ])?;
            }
            Ok(())
        })
    }

    fn save_calendar(&mut self, rows: &[CalendarRow]) -> Result<(), AppError> {
        let path = self.calendar_path();
        self.write_atomically(&path, |w| {
            if rows.is_empty() {
                w.write_record(["Indicator", "Source", "Next Release", "Last Updated"])?;
            }
            for row in rows {
                w.serialize(row)?;
            }
            Ok(())
        })
    }
}

/// `US Unemployment (SA)` → `us_unemployment_sa.csv`.
pub fn series_file_name(indicator: &str) -> String {
    let stem: String = indicator
        .chars()
        .filter(|c| *c != '(' && *c != ')')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect::<String>()
        .to_lowercase();
    format!("{stem}.csv")
}

/// Read a stored series back through the normalizer so the series invariant holds
/// even for hand-edited files.
pub fn load_series(path: &Path) -> Result<Series, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read headers of '{}': {e}", path.display())))?
        .clone();
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let indicator_idx = lower.iter().position(|h| h == "indicator");
    let source_idx = lower.iter().position(|h| h == "source");

    let mut raw = RawTable::new(headers.iter());
    let mut indicator = None;
    let mut source = None;
    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::io(format!("Invalid CSV row in '{}': {e}", path.display())))?;
        if indicator.is_none() {
            indicator = indicator_idx.and_then(|i| record.get(i)).map(str::to_string);
            source = source_idx.and_then(|i| record.get(i)).map(str::to_string);
        }
        raw.push_row(record.iter().map(RawCell::from).collect());
    }

    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " ").to_uppercase())
        .unwrap_or_default();
    let indicator = indicator.unwrap_or(fallback);
    let source = source.unwrap_or_default();
    Ok(normalize(&raw, &source, &indicator))
}
