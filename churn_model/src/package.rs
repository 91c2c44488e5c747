//! Immutable model bundle written once by training and loaded by serving

use crate::forest::{Estimator, RandomForest};
use crate::metrics::ClassificationReport;
use crate::schema::ModelSchema;
use crate::{PipelineError, Result};
use chrono::NaiveDate;
use feature_math::StandardScaler;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Facts about the training run that produced a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Reference date the training features were computed against
    pub reference_date: NaiveDate,
    pub churn_threshold_days: f64,
    pub training_rows: usize,
    pub roc_auc: Option<f64>,
    pub report: Option<ClassificationReport>,
}

/// Estimator, fitted scaler and frozen schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPackage {
    schema: ModelSchema,
    scaler: StandardScaler,
    estimator: RandomForest,
    metadata: PackageMetadata,
}

impl ModelPackage {
    pub fn new(
        schema: ModelSchema,
        scaler: StandardScaler,
        estimator: RandomForest,
        metadata: PackageMetadata,
    ) -> Result<Self> {
        let package = Self {
            schema,
            scaler,
            estimator,
            metadata,
        };
        package.validate()?;
        Ok(package)
    }

    /// Check that the schema, scaler and estimator agree with each other
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        if self.scaler.width() != self.schema.numeric_columns.len() {
            return Err(PipelineError::InvalidArtifact(format!(
                "Scaler width {} does not match {} numeric columns",
                self.scaler.width(),
                self.schema.numeric_columns.len()
            )));
        }

        if self.estimator.n_features() != self.schema.width() {
            return Err(PipelineError::InvalidArtifact(format!(
                "Estimator expects {} features but schema has {} columns",
                self.estimator.n_features(),
                self.schema.width()
            )));
        }

        Ok(())
    }

    /// Write the package as JSON, replacing any existing file in one step
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

        info!(path = %path.display(), columns = self.schema.width(), "Saved churn model package");
        Ok(())
    }

    /// Load and validate a package; a missing file is [`PipelineError::ModelUnavailable`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                PipelineError::ModelUnavailable(format!("No churn model at {}", path.display()))
            }
            _ => PipelineError::IoError(e),
        })?;

        let package: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::InvalidArtifact(e.to_string()))?;
        package.validate()?;

        info!(path = %path.display(), columns = package.schema.width(), "Loaded churn model package");
        Ok(package)
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn estimator(&self) -> &RandomForest {
        &self.estimator
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }
}
