//! Explicit, versioned frozen column list stored with every model package

use crate::features::NUMERIC_FEATURES;
use crate::{PipelineError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Current schema layout version
pub const SCHEMA_VERSION: u32 = 1;

/// Ordered column lists fixed at training time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub version: u32,
    /// Columns scaled by the package scaler, in scaler order
    pub numeric_columns: Vec<String>,
    /// Every column fed to the estimator, in estimator order
    pub model_columns: Vec<String>,
}

impl ModelSchema {
    pub fn new(numeric_columns: Vec<String>, model_columns: Vec<String>) -> Result<Self> {
        let schema = Self {
            version: SCHEMA_VERSION,
            numeric_columns,
            model_columns,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Freeze the column list of an encoded training frame.
    ///
    /// Numeric columns are the known numeric features present in the frame; the
    /// model columns are every frame column in frame order.
    pub fn discover(frame: &DataFrame) -> Result<Self> {
        let model_columns: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let numeric_columns = NUMERIC_FEATURES
            .iter()
            .filter(|name| model_columns.iter().any(|c| c == *name))
            .map(|name| name.to_string())
            .collect();

        Self::new(numeric_columns, model_columns)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != SCHEMA_VERSION {
            return Err(PipelineError::InvalidArtifact(format!(
                "Unsupported schema version {} (expected {})",
                self.version, SCHEMA_VERSION
            )));
        }

        if self.model_columns.is_empty() {
            return Err(PipelineError::InvalidArtifact(
                "Schema has no model columns".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.model_columns {
            if !seen.insert(column.as_str()) {
                return Err(PipelineError::InvalidArtifact(format!(
                    "Duplicate model column '{column}'"
                )));
            }
        }

        if let Some(missing) = self
            .numeric_columns
            .iter()
            .find(|c| !seen.contains(c.as_str()))
        {
            return Err(PipelineError::InvalidArtifact(format!(
                "Numeric column '{missing}' is not a model column"
            )));
        }

        Ok(())
    }

    /// Fail with [`PipelineError::ColumnMismatch`] unless `found` equals the frozen list exactly
    pub fn check_columns<S: AsRef<str>>(&self, found: &[S]) -> Result<()> {
        let matches = found.len() == self.model_columns.len()
            && found
                .iter()
                .zip(&self.model_columns)
                .all(|(a, b)| a.as_ref() == b);

        if matches {
            Ok(())
        } else {
            Err(PipelineError::ColumnMismatch {
                expected: self.model_columns.clone(),
                found: found.iter().map(|s| s.as_ref().to_string()).collect(),
            })
        }
    }

    /// Position of `column` in the scaler, if it is numeric
    pub fn numeric_index(&self, column: &str) -> Option<usize> {
        self.numeric_columns.iter().position(|c| c == column)
    }

    pub fn width(&self) -> usize {
        self.model_columns.len()
    }
}
