//! Forecasting models for daily series

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt::Debug;

pub mod exponential_smoothing;
pub mod holt_winters;

/// Two-sided coverage of the forecast intervals
pub const INTERVAL_COVERAGE: f64 = 0.95;

/// One forecast step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Forecast result containing dated points with interval bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Build points for the days after `last_date`.
    ///
    /// Bounds are `value ± z * sigma * sqrt(h)` for step `h`.
    pub fn from_means(last_date: NaiveDate, means: Vec<f64>, sigma: f64) -> Result<Self> {
        let normal = Normal::new(0.0, 1.0)?;
        let z = normal.inverse_cdf(0.5 + INTERVAL_COVERAGE / 2.0);
        let sigma = if sigma.is_finite() { sigma.max(0.0) } else { 0.0 };

        let points = means
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let step = (i + 1) as i64;
                let margin = z * sigma * (step as f64).sqrt();
                ForecastPoint {
                    date: last_date + Duration::days(step),
                    value,
                    lower: value - margin,
                    upper: value + margin,
                }
            })
            .collect();

        Ok(Self { points })
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Number of periods forecasted
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast `horizon` days after the last training date
    fn forecast(&self, horizon: usize) -> Result<ForecastResult>;

    /// One-step-ahead in-sample predictions, aligned with the training series
    fn fitted(&self) -> &[f64];

    /// Last date of the training series
    fn last_date(&self) -> NaiveDate;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a daily series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a daily series
    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Standard deviation of one-step residuals
pub(crate) fn residual_sigma(actual: &[f64], fitted: &[f64]) -> f64 {
    let residuals: Vec<f64> = actual.iter().zip(fitted).map(|(a, f)| a - f).collect();
    if residuals.is_empty() {
        return 0.0;
    }
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt()
}

pub(crate) fn require_len(data: &TimeSeriesData, required: usize) -> Result<()> {
    if data.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            actual: data.len(),
        });
    }
    Ok(())
}
