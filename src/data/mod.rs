//! Historical reading dataset.
//!
//! The dataset is a delimited flat file with one row per meter observation:
//! building id, timestamp, meter reading, static building attributes and
//! weather attributes. It is loaded at most once per process and treated as
//! read-only afterwards.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Timestamp format used by the dataset and by manual entries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One meter observation with its building and weather attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRow {
    pub building_id: i64,
    pub timestamp: NaiveDateTime,
    pub meter_reading: f64,
    pub square_feet: f64,
    pub year_built: f64,
    pub floor_count: f64,
    pub primary_use: String,
    pub air_temperature: f64,
    pub dew_temperature: f64,
    pub sea_level_pressure: f64,
    pub cloud_coverage: f64,
    pub is_holiday: u8,
}

/// Raw CSV record; extra columns in the file are ignored.
#[derive(Debug, Deserialize)]
struct RawReading {
    building_id: i64,
    timestamp: String,
    meter_reading: f64,
    square_feet: f64,
    year_built: f64,
    floor_count: f64,
    primary_use: String,
    air_temperature: f64,
    dew_temperature: f64,
    sea_level_pressure: f64,
    cloud_coverage: f64,
    is_holiday: u8,
}

impl RawReading {
    fn into_row(self) -> Result<ReadingRow> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .with_context(|| format!("unparseable timestamp {:?}", self.timestamp))?;
        Ok(ReadingRow {
            building_id: self.building_id,
            timestamp,
            meter_reading: self.meter_reading,
            square_feet: self.square_feet,
            year_built: self.year_built,
            floor_count: self.floor_count,
            primary_use: self.primary_use,
            air_temperature: self.air_temperature,
            dew_temperature: self.dew_temperature,
            sea_level_pressure: self.sea_level_pressure,
            cloud_coverage: self.cloud_coverage,
            is_holiday: self.is_holiday,
        })
    }
}

/// In-memory historical dataset, in file order.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Vec<ReadingRow>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;

        let mut rows = Vec::new();
        for record in reader.deserialize::<RawReading>() {
            let raw = record.context("malformed dataset record")?;
            rows.push(raw.into_row()?);
        }

        info!(rows = rows.len(), path = %path.display(), "historical dataset loaded");
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<ReadingRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ReadingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct building ids, sorted ascending.
    pub fn building_ids(&self) -> Vec<i64> {
        self.rows
            .iter()
            .map(|r| r.building_id)
            .unique()
            .sorted()
            .collect()
    }

    /// All rows for one building, in file order.
    pub fn building_series(&self, building_id: i64) -> Vec<&ReadingRow> {
        self.rows
            .iter()
            .filter(|r| r.building_id == building_id)
            .collect()
    }
}
