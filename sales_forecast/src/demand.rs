//! Per-product demand estimate over a fixed horizon

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::exponential_smoothing::HoltLinear;
use crate::models::{ForecastModel, TrainedForecastModel};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a demand figure was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMethod {
    /// Holt linear-trend forecast summed over the horizon
    TrendModel,
    /// Average daily rate over the observed span, scaled to the horizon
    AverageRate,
    /// All sales fell on a single day; the total is reported as is
    ObservedTotal,
}

/// Units expected over the horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandEstimate {
    pub units: u64,
    pub horizon_days: usize,
    pub method: DemandMethod,
}

/// Chooses between a fitted model and a rate fallback for sparse histories
#[derive(Debug, Clone)]
pub struct DemandRule {
    pub horizon_days: usize,
    /// A model is fitted only when more than this many days had sales
    pub min_active_days: usize,
    /// Level smoothing for the trend model
    pub level_smoothing: f64,
}

impl Default for DemandRule {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            min_active_days: 7,
            level_smoothing: 0.2,
        }
    }
}

impl DemandRule {
    pub fn with_horizon(horizon_days: usize) -> Self {
        Self {
            horizon_days,
            ..Self::default()
        }
    }

    /// Estimate demand from a daily quantity series
    pub fn estimate(&self, daily: &TimeSeriesData) -> Result<DemandEstimate> {
        if daily.is_empty() {
            return Err(ForecastError::DataError(
                "No sales history for product".to_string(),
            ));
        }

        let (units, method) = if daily.active_days() > self.min_active_days {
            let trained = HoltLinear::new(self.level_smoothing)?.train(daily)?;
            let forecast = trained.forecast(self.horizon_days)?;
            (forecast.total().round().abs(), DemandMethod::TrendModel)
        } else {
            let span = daily.span_days();
            if span > 0 {
                let rate = daily.total() / span as f64;
                ((rate * self.horizon_days as f64).round().abs(), DemandMethod::AverageRate)
            } else {
                (daily.total(), DemandMethod::ObservedTotal)
            }
        };

        if !units.is_finite() {
            return Err(ForecastError::ForecastingError(format!(
                "Demand estimate is not finite ({units})"
            )));
        }

        debug!(units, ?method, active_days = daily.active_days(), "Estimated demand");
        Ok(DemandEstimate {
            units: units.max(0.0) as u64,
            horizon_days: self.horizon_days,
            method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn series(quantities: &[(i64, f64)]) -> TimeSeriesData {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        TimeSeriesData::from_observations(
            quantities
                .iter()
                .map(|(offset, q)| (start + Duration::days(*offset), *q)),
        )
    }

    #[test]
    fn dense_history_uses_trend_model() {
        let daily: Vec<(i64, f64)> = (0..20).map(|d| (d, 4.0)).collect();
        let estimate = DemandRule::default().estimate(&series(&daily)).unwrap();
        assert_eq!(estimate.method, DemandMethod::TrendModel);
        assert_eq!(estimate.units, 120);
    }

    #[rstest]
    #[case(&[(0, 3.0), (10, 7.0)], 30, DemandMethod::AverageRate)]
    #[case(&[(0, 6.0)], 6, DemandMethod::ObservedTotal)]
    #[case(&[(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0), (4, 1.0), (5, 1.0), (6, 1.0)], 35, DemandMethod::AverageRate)]
    fn sparse_history_falls_back(
        #[case] sales: &[(i64, f64)],
        #[case] units: u64,
        #[case] method: DemandMethod,
    ) {
        let estimate = DemandRule::default().estimate(&series(sales)).unwrap();
        assert_eq!(estimate.units, units);
        assert_eq!(estimate.method, method);
    }

    #[test]
    fn empty_history_is_an_error() {
        assert!(DemandRule::default()
            .estimate(&TimeSeriesData::empty())
            .is_err());
    }
}
