//! Churn model training run
//!
//! Derives features and labels, freezes the encoded column list, splits the
//! data with stratification, fits the scaler on the training split only,
//! oversamples the minority class and fits the forest. The result is a
//! validated [`ModelPackage`] plus a report on the held-out split.

use crate::encoding::{frame_rows, CategoryDrop, OneHotEncoder};
use crate::features::{FeatureEngine, ReferenceInstant};
use crate::forest::{Estimator, ForestParams, RandomForest};
use crate::labels::LabelRule;
use crate::metrics::{roc_auc, ClassificationReport};
use crate::package::{ModelPackage, PackageMetadata};
use crate::schema::ModelSchema;
use crate::smote;
use crate::{CustomerAggregate, PipelineError, Result};
use feature_math::StandardScaler;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Training run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the split and oversampling
    pub seed: u64,
    pub smote_neighbors: usize,
    pub forest: ForestParams,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            seed: 42,
            smote_neighbors: 5,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingParams {
    /// Same seed for the split, the oversampler and the forest
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.forest.seed = seed;
        self
    }
}

/// Summary of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub total_rows: usize,
    pub churned_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub synthetic_rows: usize,
    pub model_columns: Vec<String>,
    pub median_fills: BTreeMap<String, f64>,
    pub roc_auc: Option<f64>,
    pub report: Option<ClassificationReport>,
}

/// Train a churn model package from customer aggregates
pub fn train_churn_model(
    aggregates: &[CustomerAggregate],
    reference: ReferenceInstant,
    rule: &LabelRule,
    params: &TrainingParams,
) -> Result<(ModelPackage, TrainingReport)> {
    if aggregates.is_empty() {
        return Err(PipelineError::DataUnavailable(
            "No customer aggregates to train on".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&params.test_size) {
        return Err(PipelineError::Training(format!(
            "test_size must be in [0, 1), got {}",
            params.test_size
        )));
    }

    let batch = FeatureEngine::new(reference).derive(aggregates);
    let examples = rule.label_all(&batch.vectors);
    let labels: Vec<u8> = examples.iter().map(|e| e.label.target()).collect();
    let churned_rows = labels.iter().filter(|&&y| y == 1).count();

    if churned_rows == 0 || churned_rows == labels.len() {
        return Err(PipelineError::Training(
            "Training data contains a single churn class".to_string(),
        ));
    }

    let frame = OneHotEncoder::encode(&batch.vectors, CategoryDrop::First)?;
    let schema = ModelSchema::discover(&frame)?;
    let rows = frame_rows(&frame)?;

    let (train_idx, test_idx) = stratified_split(&labels, params.test_size, params.seed);
    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<u8>) {
        (
            idx.iter().map(|&i| rows[i].clone()).collect(),
            idx.iter().map(|&i| labels[i]).collect(),
        )
    };
    let (mut train_rows, train_labels) = pick(&train_idx);
    let (mut test_rows, test_labels) = pick(&test_idx);

    let positions = numeric_positions(&schema);
    let numeric_train: Vec<Vec<f64>> = train_rows
        .iter()
        .map(|row| positions.iter().map(|&(col, _)| row[col]).collect())
        .collect();
    let scaler = StandardScaler::fit(&numeric_train)?;
    scale_rows(&mut train_rows, &positions, &scaler);
    scale_rows(&mut test_rows, &positions, &scaler);

    let (fit_rows, fit_labels) = smote::oversample(
        &train_rows,
        &train_labels,
        params.smote_neighbors,
        params.seed,
    );
    let synthetic_rows = fit_rows.len() - train_rows.len();

    let forest = RandomForest::fit(&fit_rows, &fit_labels, params.forest.clone())?;

    let (auc, report) = if test_rows.is_empty() {
        warn!("Empty evaluation split, skipping metrics");
        (None, None)
    } else {
        let probabilities = forest.predict_proba(&test_rows);
        let predicted = forest.predict(&test_rows);
        (
            roc_auc(&test_labels, &probabilities),
            Some(ClassificationReport::from_predictions(
                &test_labels,
                &predicted,
            )),
        )
    };

    if let Some(report) = &report {
        info!(
            roc_auc = ?auc,
            accuracy = report.accuracy,
            churned_precision = report.churned.precision,
            churned_recall = report.churned.recall,
            churned_f1 = report.churned.f1,
            active_precision = report.active.precision,
            active_recall = report.active.recall,
            active_f1 = report.active.f1,
            "Evaluated churn model"
        );
    }

    let metadata = PackageMetadata {
        reference_date: reference.date(),
        churn_threshold_days: rule.churn_threshold_days,
        training_rows: train_rows.len(),
        roc_auc: auc,
        report: report.clone(),
    };

    let training_report = TrainingReport {
        total_rows: labels.len(),
        churned_rows,
        train_rows: train_rows.len(),
        test_rows: test_rows.len(),
        synthetic_rows,
        model_columns: schema.model_columns.clone(),
        median_fills: batch.median_fills.clone(),
        roc_auc: auc,
        report,
    };

    let package = ModelPackage::new(schema, scaler, forest, metadata)?;

    info!(
        rows = training_report.total_rows,
        churned = churned_rows,
        columns = training_report.model_columns.len(),
        "Trained churn model"
    );

    Ok((package, training_report))
}

/// (model column position, scaler position) for every numeric column
fn numeric_positions(schema: &ModelSchema) -> Vec<(usize, usize)> {
    schema
        .model_columns
        .iter()
        .enumerate()
        .filter_map(|(col, name)| schema.numeric_index(name).map(|k| (col, k)))
        .collect()
}

fn scale_rows(rows: &mut [Vec<f64>], positions: &[(usize, usize)], scaler: &StandardScaler) {
    let (means, scales) = (scaler.means(), scaler.scales());
    for row in rows.iter_mut() {
        for &(col, k) in positions {
            row[col] = (row[col] - means[k]) / scales[k];
        }
    }
}

/// Seeded split that keeps the class ratio in both parts.
///
/// Every class keeps at least one training row.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let n_test = ((members.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}
