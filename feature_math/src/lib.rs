//! # Feature Math
//!
//! Numeric building blocks shared by the churn training and serving paths.
//! Everything here is deterministic: the same input slice always yields the
//! same statistics, fill values and scaled outputs.

use thiserror::Error;

pub mod imputation;
pub mod scaling;
pub mod stats;

pub use imputation::impute_median;
pub use scaling::StandardScaler;
pub use stats::{mean, median, std_dev};

/// Errors that can occur in feature calculations
#[derive(Error, Debug, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected} columns, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Result type for feature math operations
pub type Result<T> = std::result::Result<T, MathError>;
