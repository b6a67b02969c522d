//! ECB Data Portal integration (SDMX-JSON).
//!
//! Indicator ids use the portal's `FLOW/KEY` form, e.g. `ICP/M.U2.N.000000.4.ANR`
//! for euro-area HICP inflation.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::data::{RawCell, RawTable, SourceAdapter};
use crate::domain::IndicatorDef;
use crate::error::AppError;

const BASE_URL: &str = "https://data-api.ecb.europa.eu/service/data";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TIME_DIMENSION: &str = "TIME_PERIOD";

pub struct EcbClient {
    client: Client,
}

impl EcbClient {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build ECB HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn fetch_table(&self, flow: &str, key: &str) -> Result<RawTable, AppError> {
        debug!(flow, key, "requesting ECB series");
        let resp = self
            .client
            .get(format!("{BASE_URL}/{flow}/{key}"))
            .query(&[("detail", "dataonly"), ("format", "jsondata")])
            .send()
            .map_err(|e| AppError::io(format!("ECB request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::io(format!(
                "ECB request failed with status {}.",
                resp.status()
            )));
        }

        let body: SdmxResponse = resp
            .json()
            .map_err(|e| AppError::io(format!("Failed to parse ECB response: {e}")))?;
        Ok(sdmx_to_table(&body))
    }
}

impl SourceAdapter for EcbClient {
    fn fetch(&self, indicator: &IndicatorDef) -> RawTable {
        let Some((flow, key)) = split_series_id(&indicator.id) else {
            error!(series = %indicator.id, "ECB series id must look like FLOW/KEY");
            return RawTable::empty();
        };
        match self.fetch_table(flow, key) {
            Ok(table) => table,
            Err(e) => {
                error!(series = %indicator.id, "ECB fetch failed: {e}");
                RawTable::empty()
            }
        }
    }
}

/// Split `FLOW/KEY` at the first slash.
fn split_series_id(id: &str) -> Option<(&str, &str)> {
    let (flow, key) = id.split_once('/')?;
    let (flow, key) = (flow.trim(), key.trim());
    if flow.is_empty() || key.is_empty() {
        return None;
    }
    Some((flow, key))
}

#[derive(Debug, Deserialize)]
struct SdmxResponse {
    #[serde(rename = "dataSets", default)]
    data_sets: Vec<SdmxDataSet>,
    #[serde(default)]
    structure: SdmxStructure,
}

#[derive(Debug, Deserialize)]
struct SdmxDataSet {
    #[serde(default)]
    series: BTreeMap<String, SdmxSeries>,
}

#[derive(Debug, Deserialize)]
struct SdmxSeries {
    #[serde(default)]
    observations: HashMap<String, Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxStructure {
    #[serde(default)]
    dimensions: SdmxDimensions,
}

#[derive(Debug, Default, Deserialize)]
struct SdmxDimensions {
    #[serde(default)]
    observation: Vec<SdmxDimension>,
}

#[derive(Debug, Deserialize)]
struct SdmxDimension {
    id: String,
    #[serde(default)]
    values: Vec<SdmxDimensionValue>,
}

#[derive(Debug, Deserialize)]
struct SdmxDimensionValue {
    id: String,
}

/// Zip the first series' observations with the `TIME_PERIOD` dimension.
///
/// Observation keys are positional indexes into the time dimension; periods
/// without an observation are skipped. Anything structurally missing yields an
/// empty table.
fn sdmx_to_table(body: &SdmxResponse) -> RawTable {
    let Some(series) = body.data_sets.first().and_then(|ds| ds.series.values().next()) else {
        return RawTable::empty();
    };
    let Some(time_dim) = body
        .structure
        .dimensions
        .observation
        .iter()
        .find(|d| d.id == TIME_DIMENSION)
    else {
        return RawTable::empty();
    };

    let mut table = RawTable::new(["date", "value"]);
    for (idx, period) in time_dim.values.iter().enumerate() {
        let Some(obs) = series.observations.get(&idx.to_string()) else {
            continue;
        };
        let value = match obs.first() {
            Some(Value::Number(n)) => RawCell::from(n.as_f64()),
            Some(Value::String(s)) => RawCell::Text(s.clone()),
            _ => RawCell::Missing,
        };
        table.push_row(vec![RawCell::Text(period.id.clone()), value]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "dataSets": [{
            "series": {
                "0:0:0:0:0:0": {
                    "observations": {
                        "0": [2.9],
                        "1": [2.6, 0],
                        "3": [null]
                    }
                }
            }
        }],
        "structure": {
            "dimensions": {
                "observation": [{
                    "id": "TIME_PERIOD",
                    "values": [
                        {"id": "2024-09"},
                        {"id": "2024-10"},
                        {"id": "2024-11"},
                        {"id": "2024-12"}
                    ]
                }]
            }
        }
    }"#;

    #[test]
    fn sdmx_zips_periods_with_observations() {
        let body: SdmxResponse = serde_json::from_str(SAMPLE).unwrap();
        let table = sdmx_to_table(&body);
        assert_eq!(table.columns, vec!["date", "value"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0], vec![RawCell::from("2024-09"), RawCell::Number(2.9)]);
        assert_eq!(table.rows[1], vec![RawCell::from("2024-10"), RawCell::Number(2.6)]);
        // Index 2 has no observation; index 3 carries an explicit null.
        assert_eq!(table.rows[2], vec![RawCell::from("2024-12"), RawCell::Missing]);
    }

    #[test]
    fn sdmx_without_time_dimension_is_empty() {
        let body: SdmxResponse =
            serde_json::from_str(r#"{"dataSets":[{"series":{"0":{"observations":{"0":[1.0]}}}}]}"#).unwrap();
        assert!(sdmx_to_table(&body).is_empty());

        let body: SdmxResponse = serde_json::from_str(r#"{"dataSets":[]}"#).unwrap();
        assert!(sdmx_to_table(&body).is_empty());
    }

    #[test]
    fn series_id_splits_at_first_slash() {
        assert_eq!(
            split_series_id("ICP/M.U2.N.000000.4.ANR"),
            Some(("ICP", "M.U2.N.000000.4.ANR"))
        );
        assert_eq!(split_series_id("EXR/D/USD"), Some(("EXR", "D/USD")));
        assert_eq!(split_series_id("ICP"), None);
        assert_eq!(split_series_id("/KEY"), None);
    }
}
