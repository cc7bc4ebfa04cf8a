//! Feature schema for the anomaly classifier.
//!
//! The classifier is order-sensitive: inference must present exactly the 16
//! columns below, in the order used at training time. Calendar fields are
//! always derived from the row's timestamp, never supplied independently.

pub mod classifier;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Number of input columns the classifier expects.
pub const FEATURE_COUNT: usize = 16;

/// The 16 feature columns, in training order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "meter_reading",
    "air_temperature",
    "square_feet",
    "year_built",
    "floor_count",
    "primary_use",
    "sea_level_pressure",
    "cloud_coverage",
    "is_holiday",
    "dew_temperature",
    "hour",
    "weekday",
    "day",
    "week",
    "month",
    "year",
];

/// Primary-use categories in the encoding order the training pipeline used.
/// Unknown categories map to the code one past the table.
const PRIMARY_USE_CATEGORIES: [&str; 16] = [
    "Education",
    "Lodging/residential",
    "Office",
    "Entertainment/public assembly",
    "Other",
    "Retail",
    "Parking",
    "Public services",
    "Warehouse/storage",
    "Food sales and service",
    "Religious worship",
    "Healthcare",
    "Utility",
    "Technology/science",
    "Manufacturing/industrial",
    "Services",
];

/// Numeric code for a primary-use category.
pub fn primary_use_code(primary_use: &str) -> f64 {
    PRIMARY_USE_CATEGORIES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(primary_use))
        .unwrap_or(PRIMARY_USE_CATEGORIES.len()) as f64
}

/// Calendar fields decomposed from a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub weekday: u32,
    /// Day of month (1-31)
    pub day: u32,
    /// ISO week number
    pub week: u32,
    /// Month (1-12)
    pub month: u32,
    pub year: i32,
}

impl CalendarFeatures {
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        Self {
            hour: timestamp.hour(),
            weekday: timestamp.weekday().num_days_from_monday(),
            day: timestamp.day(),
            week: timestamp.iso_week().week(),
            month: timestamp.month(),
            year: timestamp.year(),
        }
    }
}

/// One classifier input row, columns in [`FEATURE_COLUMNS`] order.
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Order-preserving feature table passed to the classifier.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Meter readings (column 0), in row order.
    pub fn meter_readings(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r[0]).collect()
    }
}

/// Assembles one feature row from raw attribute values and a timestamp.
#[allow(clippy::too_many_arguments)]
pub fn feature_row(
    meter_reading: f64,
    air_temperature: f64,
    square_feet: f64,
    year_built: f64,
    floor_count: f64,
    primary_use: &str,
    sea_level_pressure: f64,
    cloud_coverage: f64,
    is_holiday: u8,
    dew_temperature: f64,
    timestamp: NaiveDateTime,
) -> FeatureRow {
    let cal = CalendarFeatures::from_timestamp(timestamp);
    [
        meter_reading,
        air_temperature,
        square_feet,
        year_built,
        floor_count,
        primary_use_code(primary_use),
        sea_level_pressure,
        cloud_coverage,
        is_holiday as f64,
        dew_temperature,
        cal.hour as f64,
        cal.weekday as f64,
        cal.day as f64,
        cal.week as f64,
        cal.month as f64,
        cal.year as f64,
    ]
}
