//! Additive Holt-Winters with a weekly season
//!
//! Smoothing parameters are chosen by an exhaustive grid search on the
//! in-sample one-step squared error, so training the same series twice
//! always yields the same model.

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::{
    require_len, residual_sigma, ForecastModel, ForecastResult, TrainedForecastModel,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Days per season for daily sales
pub const WEEKLY_SEASON: usize = 7;

const ALPHA_GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
const BETA_GRID: [f64; 5] = [0.01, 0.05, 0.1, 0.2, 0.3];
const GAMMA_GRID: [f64; 5] = [0.05, 0.1, 0.2, 0.3, 0.5];

/// Holt-Winters model specification
#[derive(Debug, Clone)]
pub struct HoltWinters {
    name: String,
    season_length: usize,
    alphas: Vec<f64>,
    betas: Vec<f64>,
    gammas: Vec<f64>,
}

/// Fitted Holt-Winters state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedHoltWinters {
    name: String,
    alpha: f64,
    beta: f64,
    gamma: f64,
    level: f64,
    trend: f64,
    /// Seasonal components indexed by `t % season_length`
    seasonals: Vec<f64>,
    observations: usize,
    last_date: NaiveDate,
    sigma: f64,
    fitted: Vec<f64>,
}

impl HoltWinters {
    /// Weekly seasonal model with grid-searched smoothing parameters
    pub fn weekly() -> Self {
        Self {
            name: format!("Holt-Winters (additive, m={WEEKLY_SEASON})"),
            season_length: WEEKLY_SEASON,
            alphas: ALPHA_GRID.to_vec(),
            betas: BETA_GRID.to_vec(),
            gammas: GAMMA_GRID.to_vec(),
        }
    }

    /// Fix the smoothing parameters instead of searching
    pub fn with_params(mut self, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        for (label, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{label} must be in (0, 1], got {value}"
                )));
            }
        }
        self.alphas = vec![alpha];
        self.betas = vec![beta];
        self.gammas = vec![gamma];
        Ok(self)
    }

    pub fn season_length(&self) -> usize {
        self.season_length
    }

    /// Minimum series length: two full seasons
    pub fn min_observations(&self) -> usize {
        2 * self.season_length
    }
}

impl Default for HoltWinters {
    fn default() -> Self {
        Self::weekly()
    }
}

/// State after running the recursions over a series
struct Pass {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    fitted: Vec<f64>,
    sse: f64,
}

fn initial_state(values: &[f64], m: usize) -> (f64, f64, Vec<f64>) {
    let first = values[..m].iter().sum::<f64>() / m as f64;
    let second = values[m..2 * m].iter().sum::<f64>() / m as f64;
    let trend = (second - first) / m as f64;
    let seasonals = values[..m].iter().map(|v| v - first).collect();
    (first, trend, seasonals)
}

fn run(values: &[f64], m: usize, alpha: f64, beta: f64, gamma: f64) -> Pass {
    let (mut level, mut trend, mut seasonals) = initial_state(values, m);
    let mut fitted = Vec::with_capacity(values.len());
    let mut sse = 0.0;

    for (t, &y) in values.iter().enumerate() {
        let s = t % m;
        let prediction = level + trend + seasonals[s];
        fitted.push(prediction);
        sse += (y - prediction).powi(2);

        let previous_level = level;
        level = alpha * (y - seasonals[s]) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * trend;
        seasonals[s] = gamma * (y - level) + (1.0 - gamma) * seasonals[s];
    }

    Pass {
        level,
        trend,
        seasonals,
        fitted,
        sse,
    }
}

impl ForecastModel for HoltWinters {
    type Trained = TrainedHoltWinters;

    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained> {
        require_len(data, self.min_observations())?;
        let last_date = data
            .last_date()
            .ok_or_else(|| ForecastError::DataError("Empty time series data".to_string()))?;
        let values = data.values();
        let m = self.season_length;

        let mut best: Option<((f64, f64, f64), Pass)> = None;
        for &alpha in &self.alphas {
            for &beta in &self.betas {
                for &gamma in &self.gammas {
                    let pass = run(values, m, alpha, beta, gamma);
                    if !pass.sse.is_finite() {
                        continue;
                    }
                    if best.as_ref().map_or(true, |(_, b)| pass.sse < b.sse) {
                        best = Some(((alpha, beta, gamma), pass));
                    }
                }
            }
        }

        let ((alpha, beta, gamma), pass) = best.ok_or_else(|| {
            ForecastError::ForecastingError("No finite fit in the parameter grid".to_string())
        })?;

        let sigma = residual_sigma(values, &pass.fitted);
        info!(
            observations = values.len(),
            alpha,
            beta,
            gamma,
            sse = pass.sse,
            sigma,
            "Fitted Holt-Winters sales model"
        );

        Ok(TrainedHoltWinters {
            name: self.name.clone(),
            alpha,
            beta,
            gamma,
            level: pass.level,
            trend: pass.trend,
            seasonals: pass.seasonals,
            observations: values.len(),
            last_date,
            sigma,
            fitted: pass.fitted,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedHoltWinters {
    /// Smoothing parameters `(alpha, beta, gamma)` chosen during training
    pub fn params(&self) -> (f64, f64, f64) {
        (self.alpha, self.beta, self.gamma)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Write the fitted model as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(fs::File::create(&staging)?);
            serde_json::to_writer(writer, self)?;
        }
        fs::rename(&staging, path)?;
        info!(path = %path.display(), "Saved sales forecaster");
        Ok(())
    }

    /// Read a fitted model; a missing file is [`ForecastError::ModelUnavailable`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ForecastError::ModelUnavailable(format!("No sales forecaster at {}", path.display()))
            }
            _ => ForecastError::IoError(e),
        })?;
        let model: Self = serde_json::from_reader(BufReader::new(file))?;

        if model.seasonals.is_empty() {
            return Err(ForecastError::ModelUnavailable(format!(
                "Sales forecaster at {} has no seasonal state",
                path.display()
            )));
        }
        Ok(model)
    }
}

impl TrainedForecastModel for TrainedHoltWinters {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let m = self.seasonals.len();
        if m == 0 {
            return Err(ForecastError::ForecastingError(
                "Model has no seasonal state".to_string(),
            ));
        }

        let means = (1..=horizon)
            .map(|h| {
                let season = self.seasonals[(self.observations + h - 1) % m];
                self.level + h as f64 * self.trend + season
            })
            .collect();

        debug!(horizon, "Forecasting sales");
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn weekly_series(weeks: i64) -> TimeSeriesData {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let pattern = [10.0, 12.0, 14.0, 16.0, 18.0, 30.0, 40.0];
        TimeSeriesData::from_observations(
            (0..weeks * 7).map(|i| (start + Duration::days(i), pattern[(i % 7) as usize])),
        )
    }

    #[test]
    fn needs_two_seasons() {
        let err = HoltWinters::weekly().train(&weekly_series(1)).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData {
                required: 14,
                actual: 7
            }
        ));
        assert!(HoltWinters::weekly().train(&weekly_series(2)).is_ok());
    }

    #[test]
    fn reproduces_a_stable_weekly_pattern() {
        let trained = HoltWinters::weekly().train(&weekly_series(8)).unwrap();
        let forecast = trained.forecast(7).unwrap();

        let expected = [10.0, 12.0, 14.0, 16.0, 18.0, 30.0, 40.0];
        for (value, want) in forecast.values().iter().zip(expected) {
            assert_relative_eq!(*value, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn fixed_params_are_used() {
        let model = HoltWinters::weekly().with_params(0.3, 0.1, 0.2).unwrap();
        let trained = model.train(&weekly_series(3)).unwrap();
        assert_eq!(trained.params(), (0.3, 0.1, 0.2));
        assert!(HoltWinters::weekly().with_params(0.0, 0.1, 0.1).is_err());
    }
}
