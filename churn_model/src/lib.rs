//! # Churn Model
//!
//! `churn_model` turns per-customer aggregates into model-ready feature
//! matrices and serves churn predictions from a frozen model package.
//!
//! The same code path builds features at training time and at serving time:
//!
//! - **Feature engine**: recency, tenure, rate and ratio features against a fixed
//!   [`ReferenceInstant`], with batch-median imputation
//! - **Label deriver**: the cancelled-or-inactive business rule (training only)
//! - **Encoder / aligner**: one-hot indicators reindexed onto the frozen
//!   [`ModelSchema`] and scaled with the training-time scaler
//! - **Model adapter**: [`ChurnClassifier`] over a [`ModelPackage`], with
//!   fixed-cutoff [`RiskSegment`]s
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use churn_model::{ChurnClassifier, FeatureEngine, ModelPackage, ReferenceInstant};
//!
//! # fn run(aggregates: Vec<churn_model::CustomerAggregate>) -> churn_model::Result<()> {
//! let package = Arc::new(ModelPackage::load("churn_model.json")?);
//! let reference: ReferenceInstant = "2025-09-27".parse()?;
//!
//! let batch = FeatureEngine::new(reference).derive(&aggregates);
//! let scores = ChurnClassifier::new(package).score(&batch)?;
//! for score in scores {
//!     println!("{} {:.3} {}", score.customer_id, score.probability, score.segment);
//! }
//! # Ok(())
//! # }
//! ```

use chrono::NaiveDate;
use feature_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod adapter;
pub mod encoding;
pub mod features;
pub mod forest;
pub mod labels;
pub mod metrics;
pub mod package;
pub mod schema;
pub mod smote;
pub mod training;

pub use adapter::{ChurnClassifier, ChurnScore, RiskSegment};
pub use encoding::{AlignedMatrix, Aligner, CategoryDrop, OneHotEncoder};
pub use features::{FeatureBatch, FeatureEngine, FeatureVector, ReferenceInstant};
pub use forest::{Estimator, ForestParams, RandomForest};
pub use labels::{ChurnLabel, LabelRule, LabeledExample};
pub use package::{ModelPackage, PackageMetadata};
pub use schema::{ModelSchema, SCHEMA_VERSION};
pub use training::{train_churn_model, TrainingParams, TrainingReport};

/// Errors that can occur while building features or serving churn predictions
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No rows exist for the requested aggregation
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// An aligned matrix does not carry exactly the frozen column list
    #[error("Column mismatch: expected {expected:?}, found {found:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// No trained artifact present
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// An artifact was found but is internally inconsistent
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid reference date: {0}")]
    InvalidReference(String),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Polars error: {0}")]
    PolarsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<polars::prelude::PolarsError> for PipelineError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        PipelineError::PolarsError(err.to_string())
    }
}

/// Result type for churn pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// One denormalized row per customer, as produced by the grouped order query.
///
/// Snapshot as of query time; never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    /// Customer identifier
    pub customer_id: String,
    /// Age in years
    pub age: Option<f64>,
    /// Gender category
    pub gender: Option<String>,
    /// Country category
    pub country: Option<String>,
    /// Signup date
    pub signup_date: Option<NaiveDate>,
    /// Most recent purchase date
    pub last_seen: Option<NaiveDate>,
    /// Number of orders
    pub order_count: i64,
    /// Sum of ordered quantities
    pub total_quantity: Option<f64>,
    /// Sum of `unit_price * quantity`
    pub total_spend: Option<f64>,
    /// Mean order rating
    pub avg_rating: Option<f64>,
    /// Sum of cancellation counts
    pub total_cancellations: Option<f64>,
    /// Subscription status on the most recent order
    pub subscription_status: Option<String>,
}

impl CustomerAggregate {
    /// Create an aggregate with only an identifier and order count set
    pub fn empty(customer_id: impl Into<String>, order_count: i64) -> Self {
        Self {
            customer_id: customer_id.into(),
            age: None,
            gender: None,
            country: None,
            signup_date: None,
            last_seen: None,
            order_count,
            total_quantity: None,
            total_spend: None,
            avg_rating: None,
            total_cancellations: None,
            subscription_status: None,
        }
    }
}
