//! Error types for the sales_forecast crate

use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to series construction or content
    #[error("Data error: {0}")]
    DataError(String),

    /// Not enough observations to fit a model
    #[error("Insufficient data: need {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Error related to fitting or forecasting
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No trained forecaster present
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<statrs::StatsError> for ForecastError {
    fn from(err: statrs::StatsError) -> Self {
        ForecastError::ForecastingError(err.to_string())
    }
}
