//! Anomaly detection page.
//!
//! Two input modes, matching the dashboard controls: a CSV upload carrying
//! the 16 feature columns directly, and manual entry of up to 50 rows whose
//! calendar fields are derived from each row's timestamp. Both feed the same
//! detection path.

use axum::{extract::State, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::api::{error::ApiError, response::ApiResponse};
use crate::data::TIMESTAMP_FORMAT;
use crate::ml::{
    feature_row, primary_use_code, FeatureRow, FeatureTable, FEATURE_COLUMNS, FEATURE_COUNT,
};
use crate::state::AppState;

/// Rows shown in the result table head.
const HEAD_ROWS: usize = 5;

/// One manually entered row. Entries missing either the timestamp or the
/// meter reading are silently dropped, not flagged.
#[derive(Debug, Serialize, Deserialize)]
pub struct ManualEntry {
    pub timestamp: Option<String>,
    pub meter_reading: Option<f64>,
    #[serde(default)]
    pub air_temperature: f64,
    #[serde(default)]
    pub square_feet: f64,
    #[serde(default)]
    pub year_built: f64,
    #[serde(default)]
    pub floor_count: f64,
    #[serde(default)]
    pub primary_use: String,
    #[serde(default)]
    pub sea_level_pressure: f64,
    #[serde(default)]
    pub cloud_coverage: f64,
    #[serde(default)]
    pub is_holiday: u8,
    #[serde(default)]
    pub dew_temperature: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualDetectRequest {
    #[validate(length(min = 1, max = 50, message = "between 1 and 50 entries"))]
    pub entries: Vec<ManualEntry>,
}

#[derive(Debug, Serialize)]
pub struct LabeledReading {
    pub meter_reading: f64,
    pub label: u8,
}

/// One anomaly page render.
#[derive(Debug, Serialize)]
pub struct AnomalyRender {
    /// Head of the (meter reading, label) result table.
    pub head: Vec<LabeledReading>,
    /// Meter readings in row order, for the line chart.
    pub readings: Vec<f64>,
    /// Indexes of rows labeled anomalous, for the overlay markers.
    pub anomaly_indexes: Vec<usize>,
    /// Exact sum of the label column.
    pub anomaly_count: u64,
    pub row_count: usize,
}

/// POST /api/v1/anomaly/detect/manual
pub async fn detect_manual(
    State(state): State<AppState>,
    Json(req): Json<ManualDetectRequest>,
) -> Result<Json<ApiResponse<AnomalyRender>>, ApiError> {
    req.validate()?;

    let mut table = FeatureTable::new();
    for entry in &req.entries {
        let (ts, reading) = match (&entry.timestamp, entry.meter_reading) {
            (Some(ts), Some(reading)) if !ts.trim().is_empty() => (ts, reading),
            // incomplete row: dropped without a message
            _ => continue,
        };
        let timestamp = NaiveDateTime::parse_from_str(ts.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| ApiError::BadRequest(format!("unparseable timestamp {ts:?}: {e}")))?;

        table.push(feature_row(
            reading,
            entry.air_temperature,
            entry.square_feet,
            entry.year_built,
            entry.floor_count,
            &entry.primary_use,
            entry.sea_level_pressure,
            entry.cloud_coverage,
            entry.is_holiday,
            entry.dew_temperature,
            timestamp,
        ));
    }

    if table.is_empty() {
        // nothing survived the row filter; nothing to detect
        return Ok(Json(ApiResponse::success(empty_render())));
    }

    let render = detect(&state, table)?;
    Ok(Json(ApiResponse::success(render)))
}

/// POST /api/v1/anomaly/detect/upload
///
/// Body is the raw CSV file. It must carry the 16 feature columns named
/// exactly as the classifier expects; no other format is accepted.
pub async fn detect_upload(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ApiResponse<AnomalyRender>>, ApiError> {
    let table = parse_feature_csv(&body)?;
    let render = detect(&state, table)?;
    Ok(Json(ApiResponse::success(render)))
}

/// Shared detection path for both input modes.
fn detect(state: &AppState, table: FeatureTable) -> Result<AnomalyRender, ApiError> {
    let classifier = state
        .classifier()
        .map_err(|e| ApiError::ModelError(e.to_string()))?;

    let labels = classifier
        .predict(&table)
        .map_err(|e| ApiError::ModelError(e.to_string()))?;

    let readings = table.meter_readings();
    let head = readings
        .iter()
        .zip(labels.iter())
        .take(HEAD_ROWS)
        .map(|(&meter_reading, &label)| LabeledReading {
            meter_reading,
            label,
        })
        .collect();
    let anomaly_indexes: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == 1)
        .map(|(i, _)| i)
        .collect();
    let anomaly_count = labels.iter().map(|&l| u64::from(l)).sum();

    info!(
        rows = table.len(),
        anomalies = anomaly_count,
        "anomaly detection rendered"
    );

    Ok(AnomalyRender {
        head,
        readings,
        anomaly_indexes,
        anomaly_count,
        row_count: table.len(),
    })
}

fn empty_render() -> AnomalyRender {
    AnomalyRender {
        head: Vec::new(),
        readings: Vec::new(),
        anomaly_indexes: Vec::new(),
        anomaly_count: 0,
        row_count: 0,
    }
}

/// Parses an uploaded CSV into the fixed-order feature table.
fn parse_feature_csv(body: &str) -> Result<FeatureTable, ApiError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ApiError::BadRequest(format!("malformed CSV: {e}")))?
        .clone();

    // map each expected column to its position in the upload
    let mut indexes = [0usize; FEATURE_COUNT];
    let mut missing = Vec::new();
    for (i, column) in FEATURE_COLUMNS.iter().enumerate() {
        match headers.iter().position(|h| h == *column) {
            Some(pos) => indexes[i] = pos,
            None => missing.push(*column),
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::ValidationError(format!(
            "uploaded CSV is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut table = FeatureTable::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ApiError::BadRequest(format!("malformed CSV: {e}")))?;

        let mut row: FeatureRow = [0.0; FEATURE_COUNT];
        for (i, column) in FEATURE_COLUMNS.iter().enumerate() {
            let cell = record.get(indexes[i]).unwrap_or("").trim();
            row[i] = if *column == "primary_use" {
                // the category column may be textual or pre-encoded
                cell.parse::<f64>().unwrap_or_else(|_| primary_use_code(cell))
            } else {
                cell.parse::<f64>().map_err(|_| {
                    ApiError::BadRequest(format!(
                        "row {}: column {column:?} has non-numeric value {cell:?}",
                        line + 1
                    ))
                })?
            };
        }
        table.push(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_parser_reorders_columns_to_schema() {
        // columns deliberately out of schema order
        let csv = "year,meter_reading,air_temperature,square_feet,year_built,floor_count,primary_use,sea_level_pressure,cloud_coverage,is_holiday,dew_temperature,hour,weekday,day,week,month\n\
                   2023,42.0,10.0,5000,1995,3,Office,1013.0,2.0,1,4.5,14,3,15,24,6\n";
        let table = parse_feature_csv(csv).unwrap();
        assert_eq!(table.len(), 1);
        let row = table.rows()[0];
        assert_eq!(row[0], 42.0); // meter_reading
        assert_eq!(row[5], 2.0); // primary_use encoded
        assert_eq!(row[15], 2023.0); // year
    }

    #[test]
    fn upload_parser_rejects_missing_columns() {
        let csv = "meter_reading,air_temperature\n42.0,10.0\n";
        let err = parse_feature_csv(csv).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert!(err.to_string().contains("square_feet"));
    }

    #[test]
    fn upload_parser_rejects_non_numeric_cells() {
        let mut csv = FEATURE_COLUMNS.join(",");
        csv.push_str("\nnot-a-number,1,2,3,4,Office,5,6,0,7,8,9,10,11,12,2023\n");
        let err = parse_feature_csv(&csv).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn upload_parser_accepts_pre_encoded_primary_use() {
        let mut csv = FEATURE_COLUMNS.join(",");
        csv.push_str("\n42.0,1,2,3,4,7.0,5,6,0,7,8,9,10,11,12,2023\n");
        let table = parse_feature_csv(&csv).unwrap();
        assert_eq!(table.rows()[0][5], 7.0);
    }

    #[test]
    fn manual_request_length_is_validated() {
        let entries: Vec<ManualEntry> = Vec::new();
        let req = ManualDetectRequest { entries };
        assert!(req.validate().is_err());
    }
}
