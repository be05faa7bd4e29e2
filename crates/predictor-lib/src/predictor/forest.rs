//! Random forest regressor
//!
//! Bagged ensemble of variance-reduction regression trees. Every tree draws
//! its bootstrap sample and feature subsets from a ChaCha8 stream seeded
//! with `seed + tree_index`, so a fixed seed reproduces the same forest.

use super::Regressor;
use crate::error::ModelError;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (all if None)
    pub max_features: Option<usize>,
    /// Bootstrap sampling per tree
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Tree node; children are indices into the owning tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Single regression tree stored as a flat node list rooted at index 0,
/// so the serialized form stays shallow whatever the tree depth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl RegressionTree {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Some(TreeNode::Split { left, right, .. }) = self.nodes.get(index) {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }
}

struct TreeBuilder<'a> {
    config: &'a ForestConfig,
    features: ArrayView2<'a, f64>,
    target: ArrayView1<'a, f64>,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    /// Grow the subtree for `indices` and return the index of its root node
    fn build(&mut self, indices: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let (mean, sse) = mean_and_sse(indices.iter().map(|&i| self.target[i]));
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: mean,
            n_samples: indices.len(),
        });

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || sse < 1e-12
        {
            return id;
        }

        if let Some(split) = self.best_split(indices, sse, rng) {
            self.importances[split.feature] += split.gain;
            let left = self.build(&split.left, depth + 1, rng);
            let right = self.build(&split.right, depth + 1, rng);
            self.nodes[id] = TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
        }
        id
    }

    /// Best SSE-reducing split over a random feature subset, found with a
    /// single sorted sweep per feature
    fn best_split(
        &self,
        indices: &[usize],
        parent_sse: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = self.features.ncols();
        let max_features = self.config.max_features.unwrap_or(n_features).clamp(1, n_features.max(1));
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut candidates: Vec<usize> = (0..n_features).collect();
        candidates.shuffle(rng);
        candidates.truncate(max_features);

        let total_sum: f64 = indices.iter().map(|&i| self.target[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.target[i].powi(2)).sum();
        let n = indices.len();

        let mut best: Option<(usize, f64, f64)> = None;

        for &feature in &candidates {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| self.features[[a, feature]].total_cmp(&self.features[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let y = self.target[sorted[k]];
                left_sum += y;
                left_sq += y * y;

                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let here = self.features[[sorted[k], feature]];
                let next = self.features[[sorted[k + 1], feature]];
                if next <= here {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / n_left as f64;
                let right_sse = right_sq - right_sum * right_sum / n_right as f64;
                let gain = parent_sse - (left_sse + right_sse);

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (here + next) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, gain)| {
            let (left, right) = indices
                .iter()
                .copied()
                .partition(|&i| self.features[[i, feature]] <= threshold);
            SplitCandidate {
                feature,
                threshold,
                gain,
                left,
                right,
            }
        })
    }
}

fn mean_and_sse(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(c, s), v| (c + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let sse = values.map(|v| (v - mean).powi(2)).sum();
    (mean, sse)
}

/// Bagged regression trees averaged at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    n_features: Option<usize>,
    feature_importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: None,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Deepest tree in the fitted forest
    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
    }

    /// Normalized impurity-decrease importances, one per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn fit_tree(
        &self,
        tree_index: usize,
        features: ArrayView2<f64>,
        target: ArrayView1<f64>,
    ) -> RegressionTree {
        let n = features.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(tree_index as u64));

        let indices: Vec<usize> = if self.config.bootstrap {
            (0..n).map(|_| rng.gen_range(0..n)).collect()
        } else {
            (0..n).collect()
        };

        let mut builder = TreeBuilder {
            config: &self.config,
            features: features.view(),
            target: target.view(),
            nodes: Vec::new(),
            importances: vec![0.0; features.ncols()],
        };
        builder.build(&indices, 0, &mut rng);

        RegressionTree {
            nodes: builder.nodes,
            importances: normalized(builder.importances),
        }
    }
}

fn normalized(mut values: Vec<f64>) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
    values
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, features: ArrayView2<f64>, target: ArrayView1<f64>) -> Result<(), ModelError> {
        if features.nrows() != target.len() {
            return Err(ModelError::TargetLengthMismatch {
                rows: features.nrows(),
                targets: target.len(),
            });
        }
        if features.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }

        let trees: Vec<RegressionTree> = (0..self.config.n_trees.max(1))
            .map(|i| self.fit_tree(i, features, target))
            .collect();

        let mut importances = vec![0.0; features.ncols()];
        for tree in &trees {
            for (total, imp) in importances.iter_mut().zip(&tree.importances) {
                *total += imp;
            }
        }

        self.feature_importances = normalized(importances);
        self.trees = trees;
        self.n_features = Some(features.ncols());
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        let expected = self.n_features.ok_or(ModelError::NotFitted)?;
        if features.ncols() != expected {
            return Err(ModelError::FeatureCountMismatch {
                expected,
                actual: features.ncols(),
            });
        }

        let n_trees = self.trees.len() as f64;
        Ok(features
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}
