//! A from-scratch isolation-forest style unsupervised scorer.
//!
//! No example repo in the retrieval pack bundles a classical ML crate, and
//! spec.md explicitly allows "any unsupervised scorer with `fit`/`score`
//! semantics" — this is a small, self-contained one built on random-split
//! binary trees and path-length scoring (Liu, Ting & Zhou, 2008).
//!
//! Scoring convention (documented once, at the boundary): **higher score
//! means more anomalous**. A point isolated in very few splits (short
//! average path length across the ensemble) gets a score close to 1; a
//! point that takes many splits to isolate (it sits in a dense region)
//! gets a score close to 0.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_TREE_COUNT: usize = 100;
const MAX_SUBSAMPLE: usize = 256;

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Node {
    Leaf { size: usize },
    Internal {
        feature: usize,
        split_value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IsolationTree {
    root: Node,
}

fn build_tree(data: &[Vec<f64>], indices: &[usize], depth: usize, max_depth: usize, rng: &mut impl Rng) -> Node {
    if depth >= max_depth || indices.len() <= 1 {
        return Node::Leaf { size: indices.len() };
    }
    let n_features = data[0].len();
    if n_features == 0 {
        return Node::Leaf { size: indices.len() };
    }

    let mut feature_order: Vec<usize> = (0..n_features).collect();
    feature_order.shuffle(rng);

    for feature in feature_order {
        let values: Vec<f64> = indices.iter().map(|&i| data[i][feature]).collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if (max - min).abs() < f64::EPSILON {
            continue;
        }
        let split_value = rng.gen_range(min..max);
        let left_indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| data[i][feature] < split_value)
            .collect();
        let right_indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| data[i][feature] >= split_value)
            .collect();
        if left_indices.is_empty() || right_indices.is_empty() {
            continue;
        }
        return Node::Internal {
            feature,
            split_value,
            left: Box::new(build_tree(data, &left_indices, depth + 1, max_depth, rng)),
            right: Box::new(build_tree(data, &right_indices, depth + 1, max_depth, rng)),
        };
    }
    Node::Leaf { size: indices.len() }
}

/// Average path length of an unsuccessful BST search over `n` points —
/// the normalizing constant `c(n)` from the isolation forest paper.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (n - 1.0).ln() + 0.5772156649 - 2.0 * (n - 1.0) / n
}

fn path_length(node: &Node, vector: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Internal {
            feature,
            split_value,
            left,
            right,
        } => {
            if vector[*feature] < *split_value {
                path_length(left, vector, depth + 1)
            } else {
                path_length(right, vector, depth + 1)
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
}

impl IsolationForest {
    /// Fit a new forest on `data`. Each row must already be the same
    /// length (the caller's `FeatureSchema` width).
    pub fn fit(data: &[Vec<f64>], contamination: f64) -> Result<Self, String> {
        if data.is_empty() {
            return Err("cannot fit on an empty batch".to_string());
        }
        let width = data[0].len();
        if width == 0 || data.iter().any(|row| row.len() != width) {
            return Err("feature vectors must be non-empty and uniform width".to_string());
        }

        let mut rng = rand::thread_rng();
        let retained = ((1.0 - contamination).max(0.1) * data.len() as f64).ceil() as usize;
        let subsample_size = retained.clamp(1, MAX_SUBSAMPLE).min(data.len());
        let max_depth = (subsample_size as f64).log2().ceil().max(1.0) as usize;

        let all_indices: Vec<usize> = (0..data.len()).collect();
        let mut trees = Vec::with_capacity(DEFAULT_TREE_COUNT);
        for _ in 0..DEFAULT_TREE_COUNT {
            let mut sample = all_indices.clone();
            sample.shuffle(&mut rng);
            sample.truncate(subsample_size);
            trees.push(IsolationTree {
                root: build_tree(data, &sample, 0, max_depth, &mut rng),
            });
        }

        Ok(Self {
            trees,
            subsample_size,
        })
    }

    /// Normalized anomaly score in `[0, 1]`; higher is more anomalous.
    pub fn score(&self, vector: &[f64]) -> f64 {
        if self.trees.is_empty() || vector.is_empty() {
            return 0.0;
        }
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|t| path_length(&t.root, vector, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.subsample_size);
        if c <= 0.0 {
            return 0.0;
        }
        2f64.powf(-avg_path / c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_cluster_scores_low_outlier_scores_high() {
        let mut rng = rand::thread_rng();
        let mut data: Vec<Vec<f64>> = (0..150)
            .map(|_| vec![rng.gen_range(95.0..105.0)])
            .collect();
        data.push(vec![1000.0]);
        let forest = IsolationForest::fit(&data, 0.05).unwrap();
        let normal_score = forest.score(&[100.0]);
        let outlier_score = forest.score(&[1000.0]);
        assert!(outlier_score > normal_score);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(IsolationForest::fit(&[], 0.05).is_err());
    }
}
