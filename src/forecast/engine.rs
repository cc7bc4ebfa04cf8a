//! Per-building forecast loop.
//!
//! One render: filter the historical dataset to the selected buildings, fit a
//! seasonal-trend model per building in selection order, project each
//! building's horizon, and accumulate everything into one combined result
//! set. The decomposition is kept for the last-processed building only.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

use super::model::{future_dates, SeasonalTrendModel, DAYS_PER_MONTH, MIN_OBSERVATIONS};
use crate::data::Dataset;

/// One selected building with its user-chosen horizon.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub building_id: i64,
    pub period_months: u32,
}

/// (building id, date, predicted value) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub building_id: i64,
    pub ds: NaiveDateTime,
    pub yhat: f64,
}

/// One building's series for a chart, historical or forecast.
#[derive(Debug, Clone)]
pub struct BuildingSeries {
    pub building_id: i64,
    pub points: Vec<(NaiveDateTime, f64)>,
}

/// Trend/seasonality decomposition over one building's forecast range.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub building_id: i64,
    pub ds: Vec<NaiveDateTime>,
    pub trend: Vec<f64>,
    pub weekly: Vec<f64>,
    pub yearly: Vec<f64>,
}

/// Everything one forecast render produces.
#[derive(Debug, Clone, Default)]
pub struct ForecastRender {
    /// Historical series per selected building, selection order.
    pub histories: Vec<BuildingSeries>,
    /// Combined result set, ordered by fit sequence.
    pub combined: Vec<ForecastPoint>,
    /// Forecast line per building for the shared chart.
    pub chart: Vec<BuildingSeries>,
    /// Decomposition of the last-processed building only.
    pub decomposition: Option<Decomposition>,
}

#[derive(Debug, Error)]
pub enum ForecastError {
    /// Recoverable: shown inline, the rest of the page is skipped.
    #[error("No data found for the selected building ids. Please try another selection.")]
    NoDataForSelection,

    /// Fatal for the whole render; earlier buildings' results are discarded.
    #[error("building {building_id} has {observed} observations, {required} required to fit")]
    InsufficientHistory {
        building_id: i64,
        observed: usize,
        required: usize,
    },

    #[error(transparent)]
    Fit(#[from] anyhow::Error),
}

/// Runs the whole forecast page render for one selection snapshot.
///
/// An empty selection is a no-op; a selection matching no rows at all is the
/// user-visible no-data error.
pub fn run(dataset: &Dataset, selections: &[Selection]) -> Result<ForecastRender, ForecastError> {
    if selections.is_empty() {
        return Ok(ForecastRender::default());
    }

    let per_building: Vec<(Selection, Vec<(NaiveDateTime, f64)>)> = selections
        .iter()
        .map(|sel| {
            let series: Vec<(NaiveDateTime, f64)> = dataset
                .building_series(sel.building_id)
                .iter()
                .map(|r| (r.timestamp, r.meter_reading))
                .collect();
            (*sel, series)
        })
        .collect();

    if per_building.iter().all(|(_, series)| series.is_empty()) {
        return Err(ForecastError::NoDataForSelection);
    }

    let mut render = ForecastRender::default();

    for (sel, series) in per_building {
        if series.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientHistory {
                building_id: sel.building_id,
                observed: series.len(),
                required: MIN_OBSERVATIONS,
            });
        }

        let horizon_days = sel.period_months * DAYS_PER_MONTH;
        info!(
            building_id = sel.building_id,
            observations = series.len(),
            horizon_days,
            "fitting seasonal trend model"
        );

        let model = SeasonalTrendModel::fit(&series)?;

        // Prediction range covers the historical fit range plus the future
        // horizon at daily granularity.
        let last = series[series.len() - 1].0;
        let mut ds: Vec<NaiveDateTime> = series.iter().map(|(ts, _)| *ts).collect();
        ds.extend(future_dates(last, horizon_days));

        let forecast: Vec<(NaiveDateTime, f64)> =
            ds.iter().map(|&ts| (ts, model.predict(ts))).collect();

        render.histories.push(BuildingSeries {
            building_id: sel.building_id,
            points: series,
        });
        render
            .combined
            .extend(forecast.iter().map(|&(ds, yhat)| ForecastPoint {
                building_id: sel.building_id,
                ds,
                yhat,
            }));
        render.chart.push(BuildingSeries {
            building_id: sel.building_id,
            points: forecast,
        });

        // Overwritten every iteration; only the last building's survives.
        let components: Vec<_> = ds.iter().map(|&ts| model.components(ts)).collect();
        render.decomposition = Some(Decomposition {
            building_id: sel.building_id,
            ds,
            trend: components.iter().map(|c| c.trend).collect(),
            weekly: components.iter().map(|c| c.weekly).collect(),
            yearly: components.iter().map(|c| c.yearly).collect(),
        });
    }

    Ok(render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ReadingRow;
    use chrono::{Duration, NaiveDate};

    fn dataset_with_buildings(specs: &[(i64, usize)]) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut rows = Vec::new();
        for &(building_id, days) in specs {
            for d in 0..days {
                rows.push(ReadingRow {
                    building_id,
                    timestamp: start + Duration::days(d as i64),
                    meter_reading: 100.0 + building_id as f64 + d as f64 * 0.1,
                    square_feet: 4000.0,
                    year_built: 1990.0,
                    floor_count: 2.0,
                    primary_use: "Office".into(),
                    air_temperature: 10.0,
                    dew_temperature: 4.0,
                    sea_level_pressure: 1013.0,
                    cloud_coverage: 2.0,
                    is_holiday: 0,
                });
            }
        }
        Dataset::from_rows(rows)
    }

    fn sel(building_id: i64, period_months: u32) -> Selection {
        Selection {
            building_id,
            period_months,
        }
    }

    #[test]
    fn empty_selection_is_a_noop() {
        let ds = dataset_with_buildings(&[(1, 60)]);
        let render = run(&ds, &[]).unwrap();
        assert!(render.histories.is_empty());
        assert!(render.combined.is_empty());
        assert!(render.chart.is_empty());
        assert!(render.decomposition.is_none());
    }

    #[test]
    fn unknown_building_is_a_user_visible_error() {
        let ds = dataset_with_buildings(&[(1, 60)]);
        let err = run(&ds, &[sel(99, 3)]).unwrap_err();
        assert!(matches!(err, ForecastError::NoDataForSelection));
        assert!(err.to_string().contains("No data found"));
    }

    #[test]
    fn combined_rows_cover_history_plus_horizon_per_building() {
        let ds = dataset_with_buildings(&[(1, 60), (2, 45)]);
        let render = run(&ds, &[sel(1, 3), sel(2, 1)]).unwrap();

        let expected = (60 + 3 * 30) + (45 + 30);
        assert_eq!(render.combined.len(), expected);
        assert_eq!(
            render.combined.iter().filter(|p| p.building_id == 1).count(),
            60 + 90
        );
        assert_eq!(
            render.combined.iter().filter(|p| p.building_id == 2).count(),
            45 + 30
        );
    }

    #[test]
    fn combined_is_ordered_by_fit_sequence() {
        let ds = dataset_with_buildings(&[(1, 30), (2, 30)]);
        let render = run(&ds, &[sel(2, 1), sel(1, 1)]).unwrap();

        // building 2 was fitted first, so all of its rows come first
        let first_half = &render.combined[..60];
        assert!(first_half.iter().all(|p| p.building_id == 2));
        assert!(render.combined[60..].iter().all(|p| p.building_id == 1));
    }

    #[test]
    fn decomposition_is_for_last_processed_building_only() {
        let ds = dataset_with_buildings(&[(1, 40), (2, 40)]);
        let render = run(&ds, &[sel(1, 1), sel(2, 1)]).unwrap();

        let decomp = render.decomposition.unwrap();
        assert_eq!(decomp.building_id, 2);
        assert_eq!(decomp.ds.len(), 40 + 30);
        assert_eq!(decomp.trend.len(), decomp.ds.len());
        assert_eq!(decomp.weekly.len(), decomp.ds.len());
        assert_eq!(decomp.yearly.len(), decomp.ds.len());
    }

    #[test]
    fn short_history_aborts_the_whole_render() {
        let ds = dataset_with_buildings(&[(1, 60), (2, 1)]);
        let err = run(&ds, &[sel(1, 3), sel(2, 3)]).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory { building_id: 2, .. }
        ));
    }

    #[test]
    fn mixed_known_and_unknown_buildings_fail_on_the_unknown_fit() {
        // the filtered set is non-empty, so the loop runs and dies on the
        // building with no rows
        let ds = dataset_with_buildings(&[(1, 60)]);
        let err = run(&ds, &[sel(1, 3), sel(99, 3)]).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory { building_id: 99, .. }
        ));
    }

    #[test]
    fn rerunning_identical_inputs_is_bit_identical() {
        let ds = dataset_with_buildings(&[(1, 80)]);
        let a = run(&ds, &[sel(1, 2)]).unwrap();
        let b = run(&ds, &[sel(1, 2)]).unwrap();

        assert_eq!(a.combined.len(), b.combined.len());
        for (pa, pb) in a.combined.iter().zip(b.combined.iter()) {
            assert_eq!(pa.ds, pb.ds);
            assert_eq!(pa.yhat.to_bits(), pb.yhat.to_bits());
        }
    }

    #[test]
    fn histories_preserve_the_raw_series() {
        let ds = dataset_with_buildings(&[(5, 30)]);
        let render = run(&ds, &[sel(5, 1)]).unwrap();

        assert_eq!(render.histories.len(), 1);
        let history = &render.histories[0];
        assert_eq!(history.building_id, 5);
        assert_eq!(history.points.len(), 30);
        assert_eq!(history.points[0].1, 100.0 + 5.0);
    }
}
