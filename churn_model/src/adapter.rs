//! Serving-side classifier adapter and risk segmentation

use crate::encoding::{AlignedMatrix, Aligner, CategoryDrop, OneHotEncoder};
use crate::features::FeatureBatch;
use crate::forest::Estimator;
use crate::package::ModelPackage;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Fixed-cutoff risk bucket for a churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskSegment {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskSegment {
    pub const ALL: [RiskSegment; 3] = [RiskSegment::Low, RiskSegment::Medium, RiskSegment::High];

    /// `< 0.3` is Low, `< 0.7` is Medium, anything else High
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            RiskSegment::Low
        } else if probability < 0.7 {
            RiskSegment::Medium
        } else {
            RiskSegment::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskSegment::Low => "Low Risk",
            RiskSegment::Medium => "Medium Risk",
            RiskSegment::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prediction for a single customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnScore {
    pub customer_id: String,
    pub last_seen: Option<NaiveDate>,
    pub total_cancellations: f64,
    pub subscription_status: Option<String>,
    pub probability: f64,
    pub predicted_churn: bool,
    pub segment: RiskSegment,
}

/// Classifier over a shared, read-only model package
#[derive(Debug, Clone)]
pub struct ChurnClassifier {
    package: Arc<ModelPackage>,
}

impl ChurnClassifier {
    pub fn new(package: Arc<ModelPackage>) -> Self {
        Self { package }
    }

    pub fn package(&self) -> &ModelPackage {
        &self.package
    }

    /// Encode and align a feature batch onto the package schema
    pub fn prepare(&self, batch: &FeatureBatch) -> Result<AlignedMatrix> {
        let frame = OneHotEncoder::encode(&batch.vectors, CategoryDrop::None)?;
        Aligner::align(&frame, self.package.schema(), self.package.scaler())
    }

    /// Hard churn labels; fails with a column mismatch on a foreign matrix
    pub fn predict(&self, matrix: &AlignedMatrix) -> Result<Vec<u8>> {
        let rows = self.checked_rows(matrix)?;
        Ok(self.package.estimator().predict(&rows))
    }

    /// Positive-class probabilities; fails with a column mismatch on a foreign matrix
    pub fn predict_probability(&self, matrix: &AlignedMatrix) -> Result<Vec<f64>> {
        let rows = self.checked_rows(matrix)?;
        Ok(self.package.estimator().predict_proba(&rows))
    }

    /// Score every customer in the batch, in batch order
    pub fn score(&self, batch: &FeatureBatch) -> Result<Vec<ChurnScore>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = self.prepare(batch)?;
        let probabilities = self.predict_probability(&matrix)?;

        let scores = batch
            .vectors
            .iter()
            .zip(probabilities)
            .map(|(vector, probability)| ChurnScore {
                customer_id: vector.customer_id().to_string(),
                last_seen: vector.aggregate.last_seen,
                total_cancellations: vector.total_cancellations,
                subscription_status: vector.aggregate.subscription_status.clone(),
                probability,
                predicted_churn: probability > 0.5,
                segment: RiskSegment::from_probability(probability),
            })
            .collect::<Vec<_>>();

        debug!(customers = scores.len(), "Scored churn batch");
        Ok(scores)
    }

    fn checked_rows(&self, matrix: &AlignedMatrix) -> Result<Vec<Vec<f64>>> {
        self.package.schema().check_columns(&matrix.columns())?;
        matrix.rows()
    }
}
