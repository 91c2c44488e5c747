//! Standard (z-score) scaling fitted once and reused

use crate::stats::{mean, std_dev};
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Column-wise standard scaler.
///
/// Fitted on training rows only; serving code calls [`StandardScaler::transform`]
/// with the stored centers and scales and never refits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit the scaler on row-major data.
    ///
    /// Columns with zero variance get a scale of `1.0` so they are only centered.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = match rows.first() {
            Some(row) => row.len(),
            None => {
                return Err(MathError::InsufficientData(
                    "Cannot fit a scaler on zero rows".to_string(),
                ))
            }
        };

        if let Some(bad) = rows.iter().find(|row| row.len() != width) {
            return Err(MathError::DimensionMismatch {
                expected: width,
                found: bad.len(),
            });
        }

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for col in 0..width {
            let values: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            let mu = mean(&values).unwrap_or(0.0);
            let sd = std_dev(&values).unwrap_or(0.0);
            means.push(mu);
            scales.push(if sd > 0.0 { sd } else { 1.0 });
        }

        Ok(Self { means, scales })
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Fitted column means
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Fitted column scales
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Scale a single column in place using the statistics of column `index`.
    pub fn transform_column(&self, index: usize, values: &mut [f64]) -> Result<()> {
        if index >= self.width() {
            return Err(MathError::DimensionMismatch {
                expected: self.width(),
                found: index + 1,
            });
        }

        let (mu, sigma) = (self.means[index], self.scales[index]);
        for v in values.iter_mut() {
            *v = (*v - mu) / sigma;
        }
        Ok(())
    }

    /// Scale row-major data with the fitted statistics.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.width() {
                    return Err(MathError::DimensionMismatch {
                        expected: self.width(),
                        found: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (mu, sigma))| (v - mu) / sigma)
                    .collect())
            })
            .collect()
    }
}
