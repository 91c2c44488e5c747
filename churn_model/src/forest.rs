//! Random forest classifier for the binary churn target
//!
//! Exact-greedy CART trees grown on bootstrap samples with Gini impurity and a
//! random feature subset per split. Fitting is fully seeded.

use crate::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Binary classifier consumed through a fit/predict contract
pub trait Estimator {
    /// Number of input columns the estimator was fitted on
    fn n_features(&self) -> usize;

    /// Probability of the positive (churn) class for one row
    fn predict_proba_row(&self, row: &[f64]) -> f64;

    /// Probability of the positive class for every row
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_proba_row(row)).collect()
    }

    /// Hard labels, `1` when the positive-class probability exceeds one half
    fn predict(&self, rows: &[Vec<f64>]) -> Vec<u8> {
        self.predict_proba(rows)
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect()
    }
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Unlimited depth when `None`
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` means `sqrt(n_features)`
    pub max_features: Option<usize>,
    /// Weight classes by `n / (2 * n_class)`
    pub balanced_class_weight: bool,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            balanced_class_weight: true,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted tree, stored as a flat node list rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { probability }) => return *probability,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], index: usize) -> usize {
            match nodes.get(index) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Fitted random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on row-major features and 0/1 labels
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], params: ForestParams) -> Result<Self> {
        if rows.is_empty() {
            return Err(PipelineError::Training(
                "Cannot fit a forest on zero rows".to_string(),
            ));
        }
        if rows.len() != labels.len() {
            return Err(PipelineError::Training(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(PipelineError::Training(
                "Forest needs at least one tree".to_string(),
            ));
        }

        let n_features = rows[0].len();
        if rows.iter().any(|row| row.len() != n_features) {
            return Err(PipelineError::Training(
                "Rows have inconsistent widths".to_string(),
            ));
        }

        let weights = class_weights(labels, params.balanced_class_weight);
        let max_features = params
            .max_features
            .unwrap_or_else(|| sqrt_features(n_features))
            .clamp(1, n_features.max(1));

        let builder = TreeBuilder {
            rows,
            labels,
            weights: &weights,
            params: &params,
            max_features,
        };

        let trees = (0..params.n_trees)
            .map(|tree_index| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_index as u64));
                let sample: Vec<usize> = if params.bootstrap {
                    (0..rows.len()).map(|_| rng.gen_range(0..rows.len())).collect()
                } else {
                    (0..rows.len()).collect()
                };
                builder.build(&sample, &mut rng)
            })
            .collect::<Vec<_>>();

        debug!(
            trees = trees.len(),
            features = n_features,
            max_features,
            "Fitted random forest"
        );

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Estimator for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }
}

/// Per-row weight from the class of each label
/// Default split candidates: `floor(sqrt(n))`, at least one
fn sqrt_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

fn class_weights(labels: &[u8], balanced: bool) -> Vec<f64> {
    if !balanced {
        return vec![1.0; labels.len()];
    }

    let n = labels.len() as f64;
    let positives = labels.iter().filter(|&&y| y == 1).count() as f64;
    let negatives = n - positives;
    let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 1.0 };
    let (w_neg, w_pos) = (weight(negatives), weight(positives));

    labels
        .iter()
        .map(|&y| if y == 1 { w_pos } else { w_neg })
        .collect()
}

/// Weighted class totals of a node: (negative, positive)
fn weighted_counts(indices: &[usize], labels: &[u8], weights: &[f64]) -> (f64, f64) {
    indices.iter().fold((0.0, 0.0), |(neg, pos), &i| {
        if labels[i] == 1 {
            (neg, pos + weights[i])
        } else {
            (neg + weights[i], pos)
        }
    })
}

fn gini(neg: f64, pos: f64) -> f64 {
    let total = neg + pos;
    if total <= 0.0 {
        return 0.0;
    }
    let (p0, p1) = (neg / total, pos / total);
    1.0 - p0 * p0 - p1 * p1
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [u8],
    weights: &'a [f64],
    params: &'a ForestParams,
    max_features: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, sample: &[usize], rng: &mut StdRng) -> DecisionTree {
        let mut nodes = Vec::new();
        self.build_node(sample, 0, &mut nodes, rng);
        DecisionTree { nodes }
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<TreeNode>,
        rng: &mut StdRng,
    ) -> usize {
        let current = nodes.len();
        let (neg, pos) = weighted_counts(indices, self.labels, self.weights);
        let probability = if neg + pos > 0.0 { pos / (neg + pos) } else { 0.0 };

        let depth_reached = self.params.max_depth.map_or(false, |max| depth >= max);
        if depth_reached
            || indices.len() < self.params.min_samples_split
            || neg == 0.0
            || pos == 0.0
        {
            nodes.push(TreeNode::Leaf { probability });
            return current;
        }

        let split = match self.find_best_split(indices, neg, pos, rng) {
            Some(split) => split,
            None => {
                nodes.push(TreeNode::Leaf { probability });
                return current;
            }
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.rows[i][split.feature] <= split.threshold);

        // Reserve the slot, children are patched in once built
        nodes.push(TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left_index = self.build_node(&left_indices, depth + 1, nodes, rng);
        let right_index = self.build_node(&right_indices, depth + 1, nodes, rng);

        if let TreeNode::Split { left, right, .. } = &mut nodes[current] {
            *left = left_index;
            *right = right_index;
        }

        current
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        neg: f64,
        pos: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n_features = self.rows[indices[0]].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);
        features.truncate(self.max_features);

        let total = neg + pos;
        let parent_impurity = gini(neg, pos);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;

        for feature in features {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let (mut left_neg, mut left_pos) = (0.0, 0.0);
            for position in 0..order.len() - 1 {
                let i = order[position];
                if self.labels[i] == 1 {
                    left_pos += self.weights[i];
                } else {
                    left_neg += self.weights[i];
                }

                let value = self.rows[i][feature];
                let next = self.rows[order[position + 1]][feature];
                if value == next {
                    continue;
                }

                let left_count = position + 1;
                if left_count < min_leaf || order.len() - left_count < min_leaf {
                    continue;
                }

                let (right_neg, right_pos) = (neg - left_neg, pos - left_pos);
                let left_weight = left_neg + left_pos;
                let right_weight = right_neg + right_pos;
                let child_impurity = (left_weight * gini(left_neg, left_pos)
                    + right_weight * gini(right_neg, right_pos))
                    / total;
                let gain = parent_impurity - child_impurity;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (value + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            rows.push(vec![i as f64, (i % 3) as f64]);
            labels.push(u8::from(i >= 10));
        }
        (rows, labels)
    }

    fn small() -> ForestParams {
        ForestParams {
            n_trees: 15,
            max_features: Some(2),
            ..ForestParams::default()
        }
    }

    #[test]
    fn learns_a_threshold() {
        let (rows, labels) = separable();
        let forest = RandomForest::fit(&rows, &labels, small()).unwrap();

        assert_eq!(forest.n_features(), 2);
        assert_eq!(forest.predict(&[vec![1.0, 0.0], vec![18.0, 0.0]]), vec![0, 1]);
        let p = forest.predict_proba(&[vec![19.0, 1.0]])[0];
        assert!(p > 0.5 && p <= 1.0);
    }

    #[test]
    fn fitting_is_seeded() {
        let (rows, labels) = separable();
        let a = RandomForest::fit(&rows, &labels, small()).unwrap();
        let b = RandomForest::fit(&rows, &labels, small()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_gives_constant_leaves() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let forest = RandomForest::fit(&rows, &[0, 0, 0], small()).unwrap();
        assert!(forest.trees().iter().all(|t| t.node_count() == 1));
        assert_eq!(forest.predict_proba_row(&[2.0]), 0.0);
    }

    #[test]
    fn max_depth_is_respected() {
        let (rows, labels) = separable();
        let params = ForestParams {
            max_depth: Some(1),
            ..small()
        };
        let forest = RandomForest::fit(&rows, &labels, params).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(RandomForest::fit(&[], &[], small()).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[0, 1], small()).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![1.0, 2.0]], &[0, 1], small()).is_err());
    }

    #[test]
    fn sqrt_features_rounds_down() {
        assert_eq!(sqrt_features(0), 1);
        assert_eq!(sqrt_features(1), 1);
        assert_eq!(sqrt_features(7), 2);
        assert_eq!(sqrt_features(8), 2);
        assert_eq!(sqrt_features(9), 3);
        assert_eq!(sqrt_features(12), 3);
    }

    #[test]
    fn balanced_weights() {
        let weights = class_weights(&[0, 0, 0, 1], true);
        assert_eq!(weights, vec![4.0 / 6.0, 4.0 / 6.0, 4.0 / 6.0, 2.0]);
        assert_eq!(class_weights(&[0, 1], false), vec![1.0, 1.0]);
    }
}
