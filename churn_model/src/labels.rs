//! Churn label derivation (training only)

use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Subscription status that marks a customer as churned regardless of recency
pub const CANCELLED_STATUS: &str = "cancelled";

/// Binary churn outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChurnLabel {
    Active,
    Churned,
}

impl ChurnLabel {
    /// Binary target value, `1` for churned
    pub fn target(self) -> u8 {
        match self {
            ChurnLabel::Active => 0,
            ChurnLabel::Churned => 1,
        }
    }

    pub fn from_target(target: u8) -> Self {
        if target == 0 {
            ChurnLabel::Active
        } else {
            ChurnLabel::Churned
        }
    }

    pub fn is_churned(self) -> bool {
        self == ChurnLabel::Churned
    }
}

/// The cancelled-or-inactive business rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Days without a purchase after which a customer counts as churned
    pub churn_threshold_days: f64,
}

impl Default for LabelRule {
    fn default() -> Self {
        Self {
            churn_threshold_days: 365.0,
        }
    }
}

impl LabelRule {
    pub fn new(churn_threshold_days: f64) -> Self {
        Self {
            churn_threshold_days,
        }
    }

    /// Churned if the status is cancelled or recency exceeds the threshold
    pub fn derive(&self, status: Option<&str>, days_since_last_purchase: f64) -> ChurnLabel {
        let cancelled = status
            .map(|s| s.trim().eq_ignore_ascii_case(CANCELLED_STATUS))
            .unwrap_or(false);

        if cancelled || days_since_last_purchase > self.churn_threshold_days {
            ChurnLabel::Churned
        } else {
            ChurnLabel::Active
        }
    }

    pub fn label(&self, features: &FeatureVector) -> ChurnLabel {
        self.derive(
            features.aggregate.subscription_status.as_deref(),
            features.days_since_last_purchase,
        )
    }

    /// Attach labels to every vector of a batch
    pub fn label_all(&self, vectors: &[FeatureVector]) -> Vec<LabeledExample> {
        vectors
            .iter()
            .map(|features| LabeledExample {
                label: self.label(features),
                features: features.clone(),
            })
            .collect()
    }
}

/// Feature vector paired with its derived label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub features: FeatureVector,
    pub label: ChurnLabel,
}
