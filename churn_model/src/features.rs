//! Feature derivation shared by training and serving
//!
//! All recency and tenure features are measured against an explicit
//! [`ReferenceInstant`]. The engine never reads the wall clock, so scoring the
//! same aggregate twice yields the same vector.

use crate::{CustomerAggregate, PipelineError, Result};
use chrono::NaiveDate;
use feature_math::impute_median;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// `days_since_last_purchase` for a customer that was never observed purchasing
pub const NEVER_SEEN_DAYS: f64 = 9999.0;

/// `tenure_days` when signup or last purchase is unknown
pub const NO_TENURE_DAYS: f64 = -1.0;

/// Numeric model features, in their fixed order
pub const NUMERIC_FEATURES: [&str; 9] = [
    "age",
    "days_since_last_purchase",
    "tenure_days",
    "purchase_count",
    "total_spend",
    "avg_spend_per_order",
    "total_cancellations",
    "avg_rating",
    "purchases_per_year",
];

/// Categorical fields that are one-hot encoded
pub const CATEGORICAL_FEATURES: [&str; 2] = ["gender", "country"];

/// Fixed point in time against which recency and tenure are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceInstant(NaiveDate);

impl ReferenceInstant {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whole days from `date` to the reference instant
    pub fn days_since(&self, date: NaiveDate) -> i64 {
        (self.0 - date).num_days()
    }
}

impl FromStr for ReferenceInstant {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| PipelineError::InvalidReference(format!("{s}: {e}")))
    }
}

impl fmt::Display for ReferenceInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A customer aggregate plus its derived, fully imputed numeric features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Source aggregate (identity, categories, status, dates)
    pub aggregate: CustomerAggregate,
    pub age: f64,
    pub days_since_last_purchase: f64,
    pub tenure_days: f64,
    pub purchase_count: f64,
    pub total_spend: f64,
    pub avg_spend_per_order: f64,
    pub total_cancellations: f64,
    pub avg_rating: f64,
    pub purchases_per_year: f64,
}

impl FeatureVector {
    pub fn customer_id(&self) -> &str {
        &self.aggregate.customer_id
    }

    /// Numeric values in [`NUMERIC_FEATURES`] order
    pub fn numeric_values(&self) -> [f64; 9] {
        [
            self.age,
            self.days_since_last_purchase,
            self.tenure_days,
            self.purchase_count,
            self.total_spend,
            self.avg_spend_per_order,
            self.total_cancellations,
            self.avg_rating,
            self.purchases_per_year,
        ]
    }

    /// Category value for one of [`CATEGORICAL_FEATURES`]
    pub fn category(&self, field: &str) -> Option<&str> {
        match field {
            "gender" => self.aggregate.gender.as_deref(),
            "country" => self.aggregate.country.as_deref(),
            _ => None,
        }
    }
}

/// Feature vectors derived from one batch, with the median fills that were applied
#[derive(Debug, Clone, Default)]
pub struct FeatureBatch {
    pub vectors: Vec<FeatureVector>,
    /// Fill value used per numeric feature (only features that had gaps)
    pub median_fills: BTreeMap<String, f64>,
}

impl FeatureBatch {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Derives feature vectors from customer aggregates
#[derive(Debug, Clone, Copy)]
pub struct FeatureEngine {
    reference: ReferenceInstant,
}

impl FeatureEngine {
    pub fn new(reference: ReferenceInstant) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> ReferenceInstant {
        self.reference
    }

    /// Derive one feature vector per aggregate.
    ///
    /// Sentinels are applied first, ratio features next, and any numeric value
    /// still missing afterwards gets the median of this batch.
    pub fn derive(&self, aggregates: &[CustomerAggregate]) -> FeatureBatch {
        let mut columns: [Vec<Option<f64>>; 9] = Default::default();

        for agg in aggregates {
            let raw = self.raw_features(agg);
            for (column, value) in columns.iter_mut().zip(raw) {
                column.push(value);
            }
        }

        let mut median_fills = BTreeMap::new();
        for (name, column) in NUMERIC_FEATURES.iter().zip(columns.iter_mut()) {
            if column.iter().any(Option::is_none) {
                let fill = impute_median(column);
                debug!(feature = name, fill, "Imputed missing values with batch median");
                median_fills.insert(name.to_string(), fill);
            }
        }

        let vectors = aggregates
            .iter()
            .enumerate()
            .map(|(row, agg)| {
                let value = |col: usize| columns[col][row].unwrap_or(0.0);
                FeatureVector {
                    aggregate: agg.clone(),
                    age: value(0),
                    days_since_last_purchase: value(1),
                    tenure_days: value(2),
                    purchase_count: value(3),
                    total_spend: value(4),
                    avg_spend_per_order: value(5),
                    total_cancellations: value(6),
                    avg_rating: value(7),
                    purchases_per_year: value(8),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            rows = vectors.len(),
            reference = %self.reference,
            "Derived feature vectors"
        );

        FeatureBatch {
            vectors,
            median_fills,
        }
    }

    /// Per-row features before imputation, in [`NUMERIC_FEATURES`] order
    fn raw_features(&self, agg: &CustomerAggregate) -> [Option<f64>; 9] {
        let days_since = agg
            .last_seen
            .map(|d| self.reference.days_since(d) as f64)
            .unwrap_or(NEVER_SEEN_DAYS);

        let tenure = match (agg.last_seen, agg.signup_date) {
            (Some(last), Some(signup)) => (last - signup).num_days() as f64,
            _ => NO_TENURE_DAYS,
        };

        let orders = agg.order_count as f64;
        let avg_spend = if agg.order_count <= 0 {
            Some(0.0)
        } else {
            agg.total_spend.map(|spend| spend / orders.max(1.0))
        };

        let denominator = tenure + 1.0;
        let per_year = if denominator > 0.0 {
            Some(orders * 365.0 / denominator)
        } else {
            None
        };

        [
            agg.age,
            Some(days_since),
            Some(tenure),
            Some(orders),
            agg.total_spend,
            avg_spend,
            agg.total_cancellations,
            agg.avg_rating,
            per_year,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> ReferenceInstant {
        "2025-09-27".parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn aggregate(id: &str) -> CustomerAggregate {
        CustomerAggregate {
            customer_id: id.to_string(),
            age: Some(30.0),
            gender: Some("Female".to_string()),
            country: Some("India".to_string()),
            signup_date: Some(date("2025-01-01")),
            last_seen: Some(date("2025-09-17")),
            order_count: 4,
            total_quantity: Some(8.0),
            total_spend: Some(200.0),
            avg_rating: Some(4.5),
            total_cancellations: Some(1.0),
            subscription_status: Some("active".to_string()),
        }
    }

    #[test]
    fn derives_recency_tenure_and_rates() {
        let batch = FeatureEngine::new(reference()).derive(&[aggregate("c1")]);
        let v = &batch.vectors[0];

        assert_eq!(v.days_since_last_purchase, 10.0);
        assert_eq!(v.tenure_days, 259.0);
        assert_eq!(v.avg_spend_per_order, 50.0);
        assert_relative_eq!(v.purchases_per_year, 4.0 * 365.0 / 260.0);
        assert!(batch.median_fills.is_empty());
    }

    #[test]
    fn zero_orders_gives_zero_average_spend() {
        let mut agg = aggregate("c1");
        agg.order_count = 0;
        agg.total_spend = None;

        let batch = FeatureEngine::new(reference()).derive(&[agg]);
        let v = &batch.vectors[0];
        assert_eq!(v.avg_spend_per_order, 0.0);
        assert!(v.avg_spend_per_order.is_finite());
        assert_eq!(v.purchases_per_year, 0.0);
    }

    #[test]
    fn missing_last_seen_uses_sentinels() {
        let mut agg = aggregate("c1");
        agg.last_seen = None;

        let batch = FeatureEngine::new(reference()).derive(&[agg, aggregate("c2")]);
        let v = &batch.vectors[0];
        assert_eq!(v.days_since_last_purchase, NEVER_SEEN_DAYS);
        assert_eq!(v.tenure_days, NO_TENURE_DAYS);
        // Rate is undefined for the sentinel tenure, so it takes the batch median
        assert_eq!(v.purchases_per_year, batch.vectors[1].purchases_per_year);
        assert!(batch.median_fills.contains_key("purchases_per_year"));
    }

    #[test]
    fn same_day_signup_does_not_divide_by_zero() {
        let mut agg = aggregate("c1");
        agg.signup_date = agg.last_seen;

        let v = &FeatureEngine::new(reference()).derive(&[agg]).vectors[0];
        assert_eq!(v.tenure_days, 0.0);
        assert_eq!(v.purchases_per_year, 4.0 * 365.0);
    }

    #[test]
    fn missing_numeric_fields_take_batch_median() {
        let mut a = aggregate("a");
        a.age = Some(20.0);
        let mut b = aggregate("b");
        b.age = Some(40.0);
        let mut c = aggregate("c");
        c.age = None;
        c.avg_rating = None;

        let batch = FeatureEngine::new(reference()).derive(&[a, b, c]);
        assert_eq!(batch.vectors[2].age, 30.0);
        assert_eq!(batch.vectors[2].avg_rating, 4.5);
        assert_eq!(batch.median_fills.get("age"), Some(&30.0));
    }

    #[test]
    fn derivation_is_reproducible() {
        let engine = FeatureEngine::new(reference());
        let rows = vec![aggregate("a"), aggregate("b")];
        assert_eq!(engine.derive(&rows).vectors, engine.derive(&rows).vectors);
    }

    #[test]
    fn rejects_bad_reference() {
        assert!("27/09/2025".parse::<ReferenceInstant>().is_err());
    }
}
