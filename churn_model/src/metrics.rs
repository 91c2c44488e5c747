//! Evaluation metrics for the churn classifier

use serde::{Deserialize, Serialize};

/// Area under the ROC curve from the rank statistic.
///
/// Tied scores share their average rank. Returns `None` when only one class
/// is present.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }

    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = rank;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = (0..labels.len())
        .filter(|&i| labels[i] == 1)
        .map(|i| ranks[i])
        .sum();
    let (p, n) = (positives as f64, negatives as f64);
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class report over a held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub active: ClassMetrics,
    pub churned: ClassMetrics,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn from_predictions(actual: &[u8], predicted: &[u8]) -> Self {
        let correct = actual
            .iter()
            .zip(predicted)
            .filter(|(a, p)| a == p)
            .count();
        let accuracy = if actual.is_empty() {
            0.0
        } else {
            correct as f64 / actual.len() as f64
        };

        Self {
            active: class_metrics(actual, predicted, 0),
            churned: class_metrics(actual, predicted, 1),
            accuracy,
        }
    }
}

fn class_metrics(actual: &[u8], predicted: &[u8], class: u8) -> ClassMetrics {
    let pairs = || actual.iter().zip(predicted);
    let tp = pairs().filter(|(a, p)| **a == class && **p == class).count() as f64;
    let fp = pairs().filter(|(a, p)| **a != class && **p == class).count() as f64;
    let support = actual.iter().filter(|&&a| a == class).count();

    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, support as f64);
    let f1 = ratio(2.0 * precision * recall, precision + recall);

    ClassMetrics {
        precision,
        recall,
        f1,
        support,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_and_inverted_ranking() {
        assert_eq!(roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]), Some(0.0));
    }

    #[test]
    fn ties_count_half() {
        assert_eq!(roc_auc(&[0, 1], &[0.5, 0.5]), Some(0.5));
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert_relative_eq!(auc, 0.75);
    }

    #[test]
    fn single_class_has_no_auc() {
        assert_eq!(roc_auc(&[1, 1], &[0.3, 0.9]), None);
    }

    #[test]
    fn report_counts() {
        let report = ClassificationReport::from_predictions(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        assert_relative_eq!(report.accuracy, 0.75);
        assert_relative_eq!(report.churned.precision, 2.0 / 3.0);
        assert_relative_eq!(report.churned.recall, 1.0);
        assert_relative_eq!(report.active.recall, 0.5);
        assert_eq!(report.active.support, 2);
    }
}
