//! Forecast page.
//!
//! One render: the client sends the selected building ids with one horizon
//! each; the response carries everything the page draws — per-building
//! historical series, the combined forecast table tail, the shared forecast
//! chart, and the decomposition of the last-processed building.

use axum::{extract::State, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::{error::ApiError, response::ApiResponse};
use crate::forecast::{self, Selection};
use crate::state::AppState;

/// Rows shown from the end of the combined result table.
const TAIL_ROWS: usize = 5;

/// Horizon bounds, in months.
const MIN_PERIOD_MONTHS: u32 = 1;
const MAX_PERIOD_MONTHS: u32 = 12;

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub building_id: i64,
    /// 1..=12 months; defaults to the configured period when omitted.
    pub period_months: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RunForecastRequest {
    pub selections: Vec<SelectionRequest>,
}

#[derive(Debug, Serialize)]
pub struct BuildingsResponse {
    pub building_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct SeriesPoint {
    pub ds: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct BuildingSeriesDto {
    pub building_id: i64,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct ForecastRow {
    pub ds: NaiveDateTime,
    pub yhat: f64,
    pub building_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DecompositionDto {
    pub building_id: i64,
    pub ds: Vec<NaiveDateTime>,
    pub trend: Vec<f64>,
    pub weekly: Vec<f64>,
    pub yearly: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct ForecastRunResponse {
    pub histories: Vec<BuildingSeriesDto>,
    pub combined_tail: Vec<ForecastRow>,
    pub combined_row_count: usize,
    pub chart: Vec<BuildingSeriesDto>,
    pub decomposition: Option<DecompositionDto>,
}

/// GET /api/v1/forecast/buildings - distinct building ids in the dataset
pub async fn list_buildings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<BuildingsResponse>>, ApiError> {
    let dataset = state.dataset()?;
    Ok(Json(ApiResponse::success(BuildingsResponse {
        building_ids: dataset.building_ids(),
    })))
}

/// POST /api/v1/forecast/run - one forecast page render
pub async fn run_forecast(
    State(state): State<AppState>,
    Json(req): Json<RunForecastRequest>,
) -> Result<Json<ApiResponse<ForecastRunResponse>>, ApiError> {
    let selections = resolve_selections(&req, state.cfg.forecast.default_period_months)?;
    let dataset = state.dataset()?;

    let render = forecast::run(dataset, &selections)?;

    let tail_start = render.combined.len().saturating_sub(TAIL_ROWS);
    let response = ForecastRunResponse {
        histories: render.histories.into_iter().map(series_dto).collect(),
        combined_row_count: render.combined.len(),
        combined_tail: render.combined[tail_start..]
            .iter()
            .map(|p| ForecastRow {
                ds: p.ds,
                yhat: p.yhat,
                building_id: p.building_id,
            })
            .collect(),
        chart: render.chart.into_iter().map(series_dto).collect(),
        decomposition: render.decomposition.map(|d| DecompositionDto {
            building_id: d.building_id,
            ds: d.ds,
            trend: d.trend,
            weekly: d.weekly,
            yearly: d.yearly,
        }),
    };

    Ok(Json(ApiResponse::success(response)))
}

fn resolve_selections(
    req: &RunForecastRequest,
    default_period: u32,
) -> Result<Vec<Selection>, ApiError> {
    req.selections
        .iter()
        .map(|s| {
            let period_months = s.period_months.unwrap_or(default_period);
            if !(MIN_PERIOD_MONTHS..=MAX_PERIOD_MONTHS).contains(&period_months) {
                return Err(ApiError::ValidationError(format!(
                    "building {}: period_months must be between {MIN_PERIOD_MONTHS} and \
                     {MAX_PERIOD_MONTHS}, got {period_months}",
                    s.building_id
                )));
            }
            Ok(Selection {
                building_id: s.building_id,
                period_months,
            })
        })
        .collect()
}

fn series_dto(series: forecast::BuildingSeries) -> BuildingSeriesDto {
    BuildingSeriesDto {
        building_id: series.building_id,
        points: series
            .points
            .into_iter()
            .map(|(ds, value)| SeriesPoint { ds, value })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(selections: Vec<SelectionRequest>) -> RunForecastRequest {
        RunForecastRequest { selections }
    }

    #[test]
    fn omitted_period_uses_the_default() {
        let req = request(vec![SelectionRequest {
            building_id: 7,
            period_months: None,
        }]);
        let selections = resolve_selections(&req, 3).unwrap();
        assert_eq!(selections[0].period_months, 3);
    }

    #[test]
    fn per_building_periods_are_independent() {
        let req = request(vec![
            SelectionRequest {
                building_id: 1,
                period_months: Some(1),
            },
            SelectionRequest {
                building_id: 2,
                period_months: Some(12),
            },
        ]);
        let selections = resolve_selections(&req, 3).unwrap();
        assert_eq!(selections[0].period_months, 1);
        assert_eq!(selections[1].period_months, 12);
    }

    #[test]
    fn out_of_range_period_is_rejected() {
        for period in [0, 13] {
            let req = request(vec![SelectionRequest {
                building_id: 7,
                period_months: Some(period),
            }]);
            assert!(resolve_selections(&req, 3).is_err());
        }
    }
}
