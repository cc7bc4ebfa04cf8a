//! Univariate seasonal-trend forecasting model.
//!
//! Fits a linear trend plus yearly and weekly Fourier seasonality to one
//! building's (timestamp, meter reading) series by SVD least squares. The fit
//! is fully deterministic given identical input, and the fitted curve can be
//! split into its trend, weekly and yearly components for decomposition
//! charts.

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use nalgebra::{DMatrix, DVector};

/// Minimum observations required to fit.
pub const MIN_OBSERVATIONS: usize = 2;

/// Horizon conversion uses a fixed 30-day month, not calendar months.
pub const DAYS_PER_MONTH: u32 = 30;

const YEARLY_ORDER: usize = 10;
const WEEKLY_ORDER: usize = 3;
const YEARLY_PERIOD_DAYS: f64 = 365.25;
const WEEKLY_PERIOD_DAYS: f64 = 7.0;

/// Design-matrix width: intercept, slope, then sin/cos pairs per seasonality.
const N_TERMS: usize = 2 + 2 * YEARLY_ORDER + 2 * WEEKLY_ORDER;

/// Fitted value split into its constituent parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Components {
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

pub struct SeasonalTrendModel {
    origin: NaiveDateTime,
    beta: DVector<f64>,
}

impl SeasonalTrendModel {
    /// Fit on one building's series. Requires at least [`MIN_OBSERVATIONS`]
    /// points; shorter histories must be rejected by the caller.
    pub fn fit(points: &[(NaiveDateTime, f64)]) -> Result<Self> {
        if points.len() < MIN_OBSERVATIONS {
            anyhow::bail!(
                "seasonal fit needs at least {MIN_OBSERVATIONS} observations, got {}",
                points.len()
            );
        }

        let origin = points[0].0;
        let design = DMatrix::from_row_iterator(
            points.len(),
            N_TERMS,
            points
                .iter()
                .flat_map(|(ts, _)| regressors(days_since(origin, *ts))),
        );
        let y = DVector::from_iterator(points.len(), points.iter().map(|(_, v)| *v));

        let beta = design
            .svd(true, true)
            .solve(&y, 1e-10)
            .map_err(|e| anyhow::anyhow!("seasonal fit failed to solve: {e}"))?;

        Ok(Self { origin, beta })
    }

    /// Predicted value at one timestamp.
    pub fn predict(&self, ts: NaiveDateTime) -> f64 {
        regressors(days_since(self.origin, ts))
            .iter()
            .zip(self.beta.iter())
            .map(|(x, b)| x * b)
            .sum()
    }

    /// Trend/weekly/yearly split at one timestamp. The parts sum to
    /// [`Self::predict`] at the same timestamp.
    pub fn components(&self, ts: NaiveDateTime) -> Components {
        let x = regressors(days_since(self.origin, ts));
        let term = |range: std::ops::Range<usize>| -> f64 {
            range.map(|i| x[i] * self.beta[i]).sum()
        };

        let yearly_end = 2 + 2 * YEARLY_ORDER;
        Components {
            trend: term(0..2),
            yearly: term(2..yearly_end),
            weekly: term(yearly_end..N_TERMS),
        }
    }
}

/// Daily future timestamps following `last`, one per horizon day.
pub fn future_dates(last: NaiveDateTime, horizon_days: u32) -> Vec<NaiveDateTime> {
    (1..=i64::from(horizon_days))
        .map(|d| last + Duration::days(d))
        .collect()
}

fn days_since(origin: NaiveDateTime, ts: NaiveDateTime) -> f64 {
    (ts - origin).num_seconds() as f64 / 86_400.0
}

fn regressors(t: f64) -> [f64; N_TERMS] {
    let mut x = [0.0; N_TERMS];
    x[0] = 1.0;
    x[1] = t;
    let mut i = 2;
    for k in 1..=YEARLY_ORDER {
        let phase = 2.0 * std::f64::consts::PI * k as f64 * t / YEARLY_PERIOD_DAYS;
        x[i] = phase.sin();
        x[i + 1] = phase.cos();
        i += 2;
    }
    for k in 1..=WEEKLY_ORDER {
        let phase = 2.0 * std::f64::consts::PI * k as f64 * t / WEEKLY_PERIOD_DAYS;
        x[i] = phase.sin();
        x[i + 1] = phase.cos();
        i += 2;
    }
    x
}
