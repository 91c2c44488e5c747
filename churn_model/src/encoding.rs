//! One-hot encoding and frozen-schema alignment
//!
//! Training encodes with [`CategoryDrop::First`] and freezes the resulting
//! columns in a [`ModelSchema`]. Serving encodes every category it sees and
//! lets [`Aligner::align`] reindex onto the frozen list, so the estimator
//! always receives the exact training-time shape.

use crate::features::{FeatureVector, CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use crate::schema::ModelSchema;
use crate::{PipelineError, Result};
use feature_math::StandardScaler;
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Which category to drop per categorical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDrop {
    /// Emit an indicator for every observed category
    None,
    /// Drop the first category in sorted order
    First,
}

/// Encodes feature vectors into a numeric frame
pub struct OneHotEncoder;

impl OneHotEncoder {
    /// Numeric feature columns followed by `<field>_<value>` indicator columns.
    ///
    /// Categories are sorted per field. A vector with a missing category gets
    /// zero in every indicator of that field.
    pub fn encode(vectors: &[FeatureVector], drop: CategoryDrop) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(NUMERIC_FEATURES.len() + 8);

        for (index, name) in NUMERIC_FEATURES.iter().enumerate() {
            let values: Vec<f64> = vectors.iter().map(|v| v.numeric_values()[index]).collect();
            columns.push(Series::new(name, values));
        }

        for field in CATEGORICAL_FEATURES {
            let categories: BTreeSet<&str> =
                vectors.iter().filter_map(|v| v.category(field)).collect();

            let skip = match drop {
                CategoryDrop::None => 0,
                CategoryDrop::First => 1,
            };

            for category in categories.into_iter().skip(skip) {
                let indicator: Vec<f64> = vectors
                    .iter()
                    .map(|v| {
                        if v.category(field) == Some(category) {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect();
                columns.push(Series::new(&format!("{field}_{category}"), indicator));
            }
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Feature matrix whose columns match a frozen schema
#[derive(Debug, Clone)]
pub struct AlignedMatrix {
    frame: DataFrame,
}

impl AlignedMatrix {
    /// Wrap an arbitrary frame. Prediction still checks its columns.
    pub fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Row-major copy of the matrix values
    pub fn rows(&self) -> Result<Vec<Vec<f64>>> {
        frame_rows(&self.frame)
    }
}

/// Reindexes encoded frames onto a frozen schema
pub struct Aligner;

impl Aligner {
    /// Reindex `frame` to `schema.model_columns` and scale numeric columns.
    ///
    /// Missing columns are zero-filled, extra columns dropped, and numeric
    /// columns scaled with the stored training-time scaler.
    pub fn align(
        frame: &DataFrame,
        schema: &ModelSchema,
        scaler: &StandardScaler,
    ) -> Result<AlignedMatrix> {
        if scaler.width() != schema.numeric_columns.len() {
            return Err(PipelineError::InvalidArtifact(format!(
                "Scaler has {} columns but schema lists {} numeric columns",
                scaler.width(),
                schema.numeric_columns.len()
            )));
        }

        let present = frame.get_column_names();
        let height = frame.height();
        let mut added = Vec::new();
        let mut columns = Vec::with_capacity(schema.width());

        for name in &schema.model_columns {
            let mut values = if present.contains(&name.as_str()) {
                column_values(frame, name)?
            } else {
                added.push(name.as_str());
                vec![0.0; height]
            };

            if let Some(index) = schema.numeric_index(name) {
                scaler.transform_column(index, &mut values)?;
            }

            columns.push(Series::new(name, values));
        }

        let dropped: Vec<&str> = present
            .iter()
            .copied()
            .filter(|c| !schema.model_columns.iter().any(|m| m == c))
            .collect();

        if !added.is_empty() {
            info!(columns = ?added, "Zero-filled columns absent from batch");
        }
        if !dropped.is_empty() {
            info!(columns = ?dropped, "Dropped columns unknown to the model");
        }
        debug!(rows = height, width = schema.width(), "Aligned feature matrix");

        let aligned = AlignedMatrix {
            frame: DataFrame::new(columns)?,
        };
        schema.check_columns(&aligned.columns())?;
        Ok(aligned)
    }
}

fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = frame.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
    Ok(values)
}

/// Row-major values of every column of `frame`, cast to `f64`
pub fn frame_rows(frame: &DataFrame) -> Result<Vec<Vec<f64>>> {
    let mut rows = vec![Vec::with_capacity(frame.width()); frame.height()];
    for name in frame.get_column_names() {
        for (row, value) in rows.iter_mut().zip(column_values(frame, name)?) {
            row.push(value);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CustomerAggregate;
    use crate::{FeatureEngine, ReferenceInstant};
    use pretty_assertions::assert_eq;

    fn vectors(people: &[(&str, Option<&str>, Option<&str>)]) -> Vec<FeatureVector> {
        let aggregates: Vec<CustomerAggregate> = people
            .iter()
            .map(|(id, gender, country)| {
                let mut agg = CustomerAggregate::empty(*id, 1);
                agg.age = Some(30.0);
                agg.total_spend = Some(10.0);
                agg.gender = gender.map(str::to_string);
                agg.country = country.map(str::to_string);
                agg
            })
            .collect();
        let reference: ReferenceInstant = "2025-09-27".parse().unwrap();
        FeatureEngine::new(reference).derive(&aggregates).vectors
    }

    #[test]
    fn drop_first_removes_sorted_baseline() {
        let batch = vectors(&[
            ("a", Some("Male"), Some("India")),
            ("b", Some("Female"), Some("USA")),
            ("c", None, Some("Brazil")),
        ]);

        let frame = OneHotEncoder::encode(&batch, CategoryDrop::First).unwrap();
        let names = frame.get_column_names();
        assert_eq!(
            &names[NUMERIC_FEATURES.len()..],
            &["gender_Male", "country_India", "country_USA"]
        );

        let male = column_values(&frame, "gender_Male").unwrap();
        assert_eq!(male, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn no_drop_keeps_every_category() {
        let batch = vectors(&[("a", Some("Male"), None), ("b", Some("Female"), None)]);
        let frame = OneHotEncoder::encode(&batch, CategoryDrop::None).unwrap();
        let names = frame.get_column_names();
        assert!(names.contains(&"gender_Female"));
        assert!(names.contains(&"gender_Male"));
        assert!(!names.iter().any(|n| n.starts_with("country_")));
    }

    #[test]
    fn align_reindexes_to_frozen_order() {
        let training = OneHotEncoder::encode(
            &vectors(&[
                ("a", Some("Female"), Some("Brazil")),
                ("b", Some("Male"), Some("India")),
            ]),
            CategoryDrop::First,
        )
        .unwrap();
        let schema = ModelSchema::discover(&training).unwrap();
        let scaler = StandardScaler::fit(&vec![vec![0.0; NUMERIC_FEATURES.len()]]).unwrap();

        // Serving batch lacks India, has an unseen country
        let serving = OneHotEncoder::encode(
            &vectors(&[("z", Some("Male"), Some("Japan"))]),
            CategoryDrop::None,
        )
        .unwrap();

        let aligned = Aligner::align(&serving, &schema, &scaler).unwrap();
        assert_eq!(aligned.columns(), schema.model_columns);

        let india = column_values(aligned.frame(), "country_India").unwrap();
        assert_eq!(india, vec![0.0]);
        let male = column_values(aligned.frame(), "gender_Male").unwrap();
        assert_eq!(male, vec![1.0]);
    }

    #[test]
    fn align_scales_numeric_columns_only() {
        let training = OneHotEncoder::encode(
            &vectors(&[("a", Some("Female"), None), ("b", Some("Male"), None)]),
            CategoryDrop::First,
        )
        .unwrap();
        let schema = ModelSchema::discover(&training).unwrap();

        let mut row = vec![0.0; NUMERIC_FEATURES.len()];
        row[0] = 20.0;
        let mut other = row.clone();
        other[0] = 40.0;
        let scaler = StandardScaler::fit(&[row, other]).unwrap();

        let aligned = Aligner::align(&training, &schema, &scaler).unwrap();
        let rows = aligned.rows().unwrap();
        // age 30 against mean 30 / sd 10
        assert_eq!(rows[0][0], 0.0);
        // gender_Male indicator untouched
        assert_eq!(rows[1][NUMERIC_FEATURES.len()], 1.0);
    }
}
