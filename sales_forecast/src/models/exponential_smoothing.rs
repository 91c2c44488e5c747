//! Exponential smoothing with an additive trend (Holt's linear method)

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::{
    require_len, residual_sigma, ForecastModel, ForecastResult, TrainedForecastModel,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const BETA_GRID: [f64; 8] = [0.01, 0.02, 0.05, 0.1, 0.15, 0.2, 0.3, 0.5];

/// Holt linear-trend model with a fixed level smoothing parameter
#[derive(Debug, Clone)]
pub struct HoltLinear {
    name: String,
    /// Level smoothing parameter
    alpha: f64,
    /// Candidate trend smoothing parameters
    betas: Vec<f64>,
}

/// Trained Holt linear-trend model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedHoltLinear {
    name: String,
    alpha: f64,
    beta: f64,
    level: f64,
    trend: f64,
    last_date: NaiveDate,
    sigma: f64,
    fitted: Vec<f64>,
}

impl HoltLinear {
    /// Create a model; the trend parameter is searched during training
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Holt Linear (alpha={})", alpha),
            alpha,
            betas: BETA_GRID.to_vec(),
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    fn run(&self, values: &[f64], beta: f64) -> (f64, f64, Vec<f64>, f64) {
        let mut level = values[0];
        let mut trend = values[1] - values[0];
        let mut fitted = Vec::with_capacity(values.len());
        let mut sse = 0.0;

        // The first observation seeds the level
        fitted.push(values[0]);
        for &y in &values[1..] {
            let prediction = level + trend;
            fitted.push(prediction);
            sse += (y - prediction).powi(2);

            let previous_level = level;
            level = self.alpha * y + (1.0 - self.alpha) * (level + trend);
            trend = beta * (level - previous_level) + (1.0 - beta) * trend;
        }

        (level, trend, fitted, sse)
    }
}

impl ForecastModel for HoltLinear {
    type Trained = TrainedHoltLinear;

    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained> {
        require_len(data, 2)?;
        let last_date = data
            .last_date()
            .ok_or_else(|| ForecastError::DataError("Empty time series data".to_string()))?;
        let values = data.values();

        let mut best: Option<(f64, (f64, f64, Vec<f64>, f64))> = None;
        for &beta in &self.betas {
            let pass = self.run(values, beta);
            if pass.3.is_finite() && best.as_ref().map_or(true, |(_, b)| pass.3 < b.3) {
                best = Some((beta, pass));
            }
        }

        let (beta, (level, trend, fitted, _)) = best.ok_or_else(|| {
            ForecastError::ForecastingError("No finite fit in the parameter grid".to_string())
        })?;

        Ok(TrainedHoltLinear {
            name: self.name.clone(),
            alpha: self.alpha,
            beta,
            sigma: residual_sigma(values, &fitted),
            level,
            trend,
            last_date,
            fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedHoltLinear {
    pub fn beta(&self) -> f64 {
        self.beta
    }
}

impl TrainedForecastModel for TrainedHoltLinear {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let means = (1..=horizon)
            .map(|h| self.level + h as f64 * self.trend)
            .collect();
        ForecastResult::from_means(self.last_date, means, self.sigma)
    }

    fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    fn name(&self) -> &str {
        &self.name
    }
}
