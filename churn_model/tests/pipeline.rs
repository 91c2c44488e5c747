use chrono::NaiveDate;
use churn_model::{
    train_churn_model, AlignedMatrix, ChurnClassifier, CustomerAggregate, FeatureEngine,
    ForestParams, LabelRule, ModelPackage, PipelineError, ReferenceInstant, RiskSegment,
    TrainingParams,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn reference() -> ReferenceInstant {
    "2025-09-27".parse().unwrap()
}

const COUNTRIES: [&str; 3] = ["Brazil", "India", "USA"];
const GENDERS: [&str; 2] = ["Female", "Male"];

fn churned(i: usize) -> CustomerAggregate {
    CustomerAggregate {
        customer_id: format!("churned-{i}"),
        age: Some(60.0 + (i % 10) as f64),
        gender: Some(GENDERS[i % 2].to_string()),
        country: Some(COUNTRIES[i % 3].to_string()),
        signup_date: Some(date("2022-01-01")),
        last_seen: Some(date("2024-01-15")),
        order_count: 1,
        total_quantity: Some(1.0),
        total_spend: Some(20.0 + i as f64),
        avg_rating: Some(1.0 + (i % 2) as f64),
        total_cancellations: Some(3.0),
        subscription_status: Some("active".to_string()),
    }
}

fn active(i: usize) -> CustomerAggregate {
    CustomerAggregate {
        customer_id: format!("active-{i}"),
        age: Some(20.0 + (i % 10) as f64),
        gender: Some(GENDERS[(i + 1) % 2].to_string()),
        country: Some(COUNTRIES[(i + 1) % 3].to_string()),
        signup_date: Some(date("2025-01-01")),
        last_seen: Some(date("2025-09-01")),
        order_count: 10,
        total_quantity: Some(25.0),
        total_spend: Some(900.0 + 10.0 * i as f64),
        avg_rating: Some(4.0 + (i % 2) as f64),
        total_cancellations: Some(0.0),
        subscription_status: Some("active".to_string()),
    }
}

fn dataset() -> Vec<CustomerAggregate> {
    (0..24).map(churned).chain((0..24).map(active)).collect()
}

fn params() -> TrainingParams {
    TrainingParams {
        forest: ForestParams {
            n_trees: 25,
            ..ForestParams::default()
        },
        ..TrainingParams::default()
    }
}

fn trained() -> ModelPackage {
    let (package, _) =
        train_churn_model(&dataset(), reference(), &LabelRule::default(), &params()).unwrap();
    package
}

#[test]
fn training_reproduces_derived_labels() {
    let rule = LabelRule::default();
    let aggregates = dataset();
    let (package, report) =
        train_churn_model(&aggregates, reference(), &rule, &params()).unwrap();

    assert_eq!(report.total_rows, 48);
    assert_eq!(report.churned_rows, 24);
    assert_eq!(report.train_rows + report.test_rows, 48);
    assert!(report.roc_auc.unwrap() > 0.9);

    let batch = FeatureEngine::new(reference()).derive(&aggregates);
    let classifier = ChurnClassifier::new(Arc::new(package));
    let matrix = classifier.prepare(&batch).unwrap();
    let predicted = classifier.predict(&matrix).unwrap();

    for (vector, label) in batch.vectors.iter().zip(predicted) {
        assert_eq!(
            label,
            rule.label(vector).target(),
            "customer {}",
            vector.customer_id()
        );
    }
}

#[test]
fn training_is_deterministic() {
    assert_eq!(trained(), trained());
}

#[test]
fn schema_drops_first_category_and_keeps_numeric_order() {
    let package = trained();
    let schema = package.schema();

    assert_eq!(
        schema.model_columns[schema.numeric_columns.len()..].to_vec(),
        vec!["gender_Male", "country_India", "country_USA"]
    );
    assert_eq!(schema.numeric_columns.len(), 9);
    assert_eq!(schema.numeric_columns[1], "days_since_last_purchase");
}

#[test]
fn alignment_matches_frozen_columns_for_any_batch() {
    let classifier = ChurnClassifier::new(Arc::new(trained()));
    let expected = classifier.package().schema().model_columns.clone();

    let mut stranger = active(0);
    stranger.country = Some("Japan".to_string());
    stranger.gender = None;

    let batches = vec![
        vec![stranger.clone()],
        vec![churned(1), churned(4)],
        vec![active(3), stranger],
    ];

    for aggregates in batches {
        let batch = FeatureEngine::new(reference()).derive(&aggregates);
        let matrix = classifier.prepare(&batch).unwrap();
        assert_eq!(matrix.columns(), expected);
        assert_eq!(matrix.height(), aggregates.len());
    }
}

#[test]
fn foreign_matrix_is_rejected() {
    let classifier = ChurnClassifier::new(Arc::new(trained()));
    let frame = DataFrame::new(vec![Series::new("age", vec![1.0])]).unwrap();
    let matrix = AlignedMatrix::from_frame(frame);

    match classifier.predict_probability(&matrix) {
        Err(PipelineError::ColumnMismatch { expected, found }) => {
            assert_eq!(found, vec!["age".to_string()]);
            assert_eq!(expected.len(), 12);
        }
        other => panic!("expected column mismatch, got {other:?}"),
    }
}

#[test]
fn scores_carry_segments() {
    let classifier = ChurnClassifier::new(Arc::new(trained()));
    let batch = FeatureEngine::new(reference()).derive(&[churned(2), active(2)]);
    let scores = classifier.score(&batch).unwrap();

    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].customer_id, "churned-2");
    assert!(scores[0].predicted_churn);
    assert_eq!(scores[0].segment, RiskSegment::from_probability(scores[0].probability));
    assert!(!scores[1].predicted_churn);
    assert_eq!(scores[1].segment, RiskSegment::Low);
}

#[test]
fn package_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("models").join("churn_model.json");
    let package = trained();

    package.save(&path).unwrap();
    let loaded = ModelPackage::load(&path).unwrap();
    assert_eq!(loaded.schema(), package.schema());
    assert_eq!(loaded.scaler().width(), package.scaler().width());
    assert_eq!(loaded.metadata().reference_date, date("2025-09-27"));

    // Saving again replaces the bundle wholesale
    package.save(&path).unwrap();
    assert_eq!(ModelPackage::load(&path).unwrap(), loaded);
}

#[test]
fn missing_or_corrupt_package() {
    let dir = tempdir().unwrap();

    let missing = ModelPackage::load(dir.path().join("absent.json"));
    assert!(matches!(missing, Err(PipelineError::ModelUnavailable(_))));

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, "{\"schema\": 1}").unwrap();
    assert!(matches!(
        ModelPackage::load(&corrupt),
        Err(PipelineError::InvalidArtifact(_))
    ));
}
