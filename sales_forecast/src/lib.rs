//! # Sales Forecast
//!
//! Daily sales and product demand forecasting.
//!
//! ## Features
//!
//! - Contiguous daily series built from dated observations (gaps zero-filled)
//! - Holt-Winters with additive trend and weekly season for total sales
//! - Holt linear-trend smoothing for per-product demand
//! - Dated forecast points with normal-theory interval bounds
//! - Sparse-history demand fallback and accuracy metrics
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, NaiveDate};
//! use sales_forecast::models::holt_winters::HoltWinters;
//! use sales_forecast::{ForecastModel, TimeSeriesData, TrainedForecastModel};
//!
//! # fn main() -> sales_forecast::Result<()> {
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let series = TimeSeriesData::from_observations(
//!     (0..28).map(|d| (start + Duration::days(d), 100.0 + (d % 7) as f64)),
//! );
//!
//! let trained = HoltWinters::weekly().train(&series)?;
//! let forecast = trained.forecast(14)?;
//! assert_eq!(forecast.horizon(), 14);
//! assert_eq!(forecast.points()[0].date, start + Duration::days(28));
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod demand;
pub mod error;
pub mod metrics;
pub mod models;

pub use crate::data::{MonthTotal, TimeSeriesData};
pub use crate::demand::{DemandEstimate, DemandMethod, DemandRule};
pub use crate::error::{ForecastError, Result};
pub use crate::models::holt_winters::{HoltWinters, TrainedHoltWinters};
pub use crate::models::{ForecastModel, ForecastPoint, ForecastResult, TrainedForecastModel};
