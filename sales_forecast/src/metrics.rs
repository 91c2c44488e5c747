//! Metrics for evaluating forecast performance

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, TrainedForecastModel};
use serde::{Deserialize, Serialize};

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error over days with non-zero actuals
    pub mape: Option<f64>,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::DataError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast.iter().zip(actual).map(|(f, a)| a - f).collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n).sqrt();

    let percentage: Vec<f64> = actual
        .iter()
        .zip(&errors)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, e)| e.abs() / a.abs() * 100.0)
        .collect();
    let mape = if percentage.is_empty() {
        None
    } else {
        Some(percentage.iter().sum::<f64>() / percentage.len() as f64)
    };

    let smape = actual
        .iter()
        .zip(forecast)
        .map(|(a, f)| {
            let denominator = a.abs() + f.abs();
            if denominator == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denominator
            }
        })
        .sum::<f64>()
        / n;

    Ok(ForecastAccuracy {
        mae,
        rmse,
        mape,
        smape,
    })
}

/// Train on all but the last `holdout` days and score the forecast of those days
pub fn holdout_accuracy<M: ForecastModel>(
    model: &M,
    data: &TimeSeriesData,
    holdout: usize,
) -> Result<ForecastAccuracy> {
    if holdout == 0 || holdout >= data.len() {
        return Err(ForecastError::InvalidParameter(format!(
            "Holdout of {} days does not fit a series of {}",
            holdout,
            data.len()
        )));
    }

    let cut = data.len() - holdout;
    let train = TimeSeriesData::new(data.dates()[..cut].to_vec(), data.values()[..cut].to_vec())?;
    let forecast = model.train(&train)?.forecast(holdout)?;
    forecast_accuracy(&forecast.values(), &data.values()[cut..])
}
