//! Service-boundary error taxonomy
//!
//! Crate errors are folded into [`ServiceError`] at the service boundary, and
//! [`ServiceError::to_body`] turns any of them into the structured result handed
//! to callers.

use churn_model::PipelineError;
use commerce_store::StoreError;
use sales_forecast::ForecastError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to callers for any store failure; the driver detail is only logged
pub const UPSTREAM_STORE_MESSAGE: &str = "The data store could not complete the request";

#[derive(Error, Debug)]
pub enum ServiceError {
    /// No rows exist for the requested aggregation
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A feature matrix does not match the frozen model columns
    #[error("Column mismatch: expected {expected:?}, found {found:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// The model backing this feature has not been trained or failed to load
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Connection or query failure
    #[error("Upstream store error: {0}")]
    UpstreamStore(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Forecast error: {0}")]
    Forecast(String),

    #[error("Training error: {0}")]
    Training(String),

    /// An upload could not be mapped onto the tables
    #[error("Import error: {0}")]
    Import(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialisable error result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ServiceError {
    /// Stable snake_case name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::DataUnavailable(_) => "data_unavailable",
            ServiceError::ColumnMismatch { .. } => "column_mismatch",
            ServiceError::ModelUnavailable(_) => "model_unavailable",
            ServiceError::UpstreamStore(_) => "upstream_store",
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::Forecast(_) => "forecast",
            ServiceError::Training(_) => "training",
            ServiceError::Import(_) => "import",
            ServiceError::Config(_) => "config",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            ServiceError::UpstreamStore(_) => UPSTREAM_STORE_MESSAGE.to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            kind: self.kind().to_string(),
            message,
        }
    }
}

impl From<PipelineError> for ServiceError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::DataUnavailable(msg) => ServiceError::DataUnavailable(msg),
            PipelineError::ColumnMismatch { expected, found } => {
                ServiceError::ColumnMismatch { expected, found }
            }
            PipelineError::ModelUnavailable(msg) => ServiceError::ModelUnavailable(msg),
            PipelineError::InvalidArtifact(msg) => {
                ServiceError::ModelUnavailable(format!("invalid churn model: {msg}"))
            }
            PipelineError::Training(msg) => ServiceError::Training(msg),
            PipelineError::InvalidReference(msg) => ServiceError::Config(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DataUnavailable(msg) => ServiceError::DataUnavailable(msg),
            StoreError::Sql(err) => ServiceError::UpstreamStore(err.to_string()),
            StoreError::Io(err) => ServiceError::UpstreamStore(err.to_string()),
            err @ (StoreError::Import { .. } | StoreError::Csv(_)) => {
                ServiceError::Import(err.to_string())
            }
        }
    }
}

impl From<ForecastError> for ServiceError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::ModelUnavailable(msg) => ServiceError::ModelUnavailable(msg),
            err @ ForecastError::InsufficientData { .. } => {
                ServiceError::DataUnavailable(err.to_string())
            }
            ForecastError::InvalidParameter(msg) => ServiceError::InvalidRequest(msg),
            other => ServiceError::Forecast(other.to_string()),
        }
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_store_failures_hide_driver_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "db locked by pid 4242");
        let err = ServiceError::from(StoreError::Io(io));
        let body = err.to_body();

        assert_eq!(body.kind, "upstream_store");
        assert_eq!(body.message, UPSTREAM_STORE_MESSAGE);
        assert!(err.to_string().contains("pid 4242"));
    }

    #[test]
    fn test_store_data_unavailable_passes_through() {
        let err = ServiceError::from(StoreError::DataUnavailable("No customers".to_string()));
        assert_eq!(
            err.to_body(),
            ErrorBody {
                kind: "data_unavailable".to_string(),
                message: "Data unavailable: No customers".to_string(),
            }
        );
    }

    #[test]
    fn test_pipeline_mismatch_is_preserved() {
        let err = ServiceError::from(PipelineError::ColumnMismatch {
            expected: vec!["age".to_string()],
            found: vec!["tenure_days".to_string()],
        });
        assert_eq!(err.kind(), "column_mismatch");
        assert!(err.to_body().message.contains("tenure_days"));
    }

    #[test]
    fn test_missing_models_map_to_model_unavailable() {
        let churn = ServiceError::from(PipelineError::ModelUnavailable("churn".to_string()));
        let sales = ServiceError::from(ForecastError::ModelUnavailable("sales".to_string()));
        assert_eq!(churn.kind(), "model_unavailable");
        assert_eq!(sales.kind(), "model_unavailable");
    }

    #[test]
    fn test_short_series_is_data_unavailable() {
        let err = ServiceError::from(ForecastError::InsufficientData {
            required: 14,
            actual: 3,
        });
        assert_eq!(err.to_body().kind, "data_unavailable");
    }
}
