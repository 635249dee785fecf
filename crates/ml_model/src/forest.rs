//! Random forest regressor.
//!
//! Trees are grown on bootstrap samples with squared-error splits and stored
//! as flat node arrays so the fitted forest serializes compactly.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest.
    pub n_trees: usize,
    /// Maximum depth of each tree (`None` grows until leaves are pure).
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
    /// Minimum samples in each leaf.
    pub min_samples_leaf: usize,
    /// Features considered per split (`None` = all).
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree.
    pub bootstrap: bool,
    /// Base seed; tree `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 20,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Dense row-major feature matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    n_cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Creates an empty matrix with a fixed column count.
    #[must_use]
    pub const fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            values: Vec::new(),
        }
    }

    /// Appends one row.
    ///
    /// # Panics
    ///
    /// Panics if the row width differs from the column count.
    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.n_cols, "row width must match column count");
        self.values.extend_from_slice(row);
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.values.len().checked_div(self.n_cols).unwrap_or(0)
    }

    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_cols..(i + 1) * self.n_cols]
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n_cols + j]
    }
}

/// Tree node stored in a flat array; children are indices into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Best split found for a node.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// A single regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree over `sample` (row indices, duplicates allowed).
    fn fit(
        x: &FeatureMatrix,
        y: &[f64],
        sample: Vec<usize>,
        config: &ForestConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0_usize, sample, 0_usize)];
        let mut features: Vec<usize> = (0..x.n_cols()).collect();
        let min_split = config.min_samples_split.max(2);
        let min_leaf = config.min_samples_leaf.max(1);

        while let Some((slot, indices, depth)) = stack.pop() {
            let value = mean(indices.iter().map(|&i| y[i]));

            let depth_reached = config.max_depth.is_some_and(|max| depth >= max);
            if depth_reached || indices.len() < min_split || is_pure(y, &indices) {
                nodes[slot] = Node::Leaf { value };
                continue;
            }

            if let Some(k) = config.max_features.filter(|&k| k < features.len()) {
                features.shuffle(rng);
                features.truncate(k.max(1));
            }

            let split = best_split(x, y, &indices, &features, min_leaf);

            if config.max_features.is_some() {
                features = (0..x.n_cols()).collect();
            }

            let Some(split) = split else {
                nodes[slot] = Node::Leaf { value };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
                .into_iter()
                .partition(|&i| x.get(i, split.feature) <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[slot] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push((right, right_rows, depth + 1));
            stack.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Predicts the target for one preprocessed row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Random forest regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fits a forest on `x`/`y`.
    ///
    /// Trees are grown in parallel; each owns a generator seeded with
    /// `seed + tree_index`, so the result does not depend on scheduling.
    ///
    /// # Panics
    ///
    /// Panics if `x` and `y` have different row counts.
    #[must_use]
    pub fn fit(config: &ForestConfig, x: &FeatureMatrix, y: &[f64]) -> Self {
        assert_eq!(x.n_rows(), y.len(), "feature and target rows must match");
        let n = y.len();

        let trees = (0..config.n_trees.max(1))
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));

                let sample: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };

                RegressionTree::fit(x, y, sample, config, &mut rng)
            })
            .collect();

        Self {
            config: config.clone(),
            trees,
        }
    }

    /// Predicts one preprocessed row as the mean over all trees.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        mean(self.trees.iter().map(|t| t.predict_row(row)))
    }

    /// Predicts every row of a matrix, in order.
    #[must_use]
    pub fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        (0..x.n_rows())
            .into_par_iter()
            .map(|i| self.predict_row(x.row(i)))
            .collect()
    }

    /// Number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub const fn config(&self) -> &ForestConfig {
        &self.config
    }

    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

/// Finds the split maximizing `sum_l^2 / n_l + sum_r^2 / n_r`, which is
/// equivalent to minimizing the children's summed squared error.
fn best_split(
    x: &FeatureMatrix,
    y: &[f64],
    indices: &[usize],
    features: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut order = indices.to_vec();

    for &feature in features {
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += y[order[pos]];

            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let current = x.get(order[pos], feature);
            let next = x.get(order[pos + 1], feature);
            if next <= current {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            let threshold_score = best.as_ref().map_or(parent_score, |b| b.score);

            if score > threshold_score {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

fn is_pure(y: &[f64], indices: &[usize]) -> bool {
    let Some(&first) = indices.first() else {
        return true;
    };
    let first = y[first];
    indices.iter().all(|&i| y[i] == first)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn matrix(rows: &[Vec<f64>]) -> FeatureMatrix {
        let mut x = FeatureMatrix::new(rows[0].len());
        for row in rows {
            x.push_row(row);
        }
        x
    }

    fn step_data() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i), f64::from(i % 3)]).collect();
        let y = (0..40).map(|i| if i < 20 { 10.0 } else { 50.0 }).collect();
        (matrix(&rows), y)
    }

    #[test]
    fn test_single_tree_learns_step() {
        let (x, y) = step_data();
        let config = ForestConfig {
            n_trees: 1,
            bootstrap: false,
            ..ForestConfig::default()
        };

        let forest = RandomForest::fit(&config, &x, &y);

        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.trees()[0].n_leaves(), 2);
        assert_relative_eq!(forest.predict_row(&[3.0, 0.0]), 10.0);
        assert_relative_eq!(forest.predict_row(&[35.0, 2.0]), 50.0);
        // Threshold sits halfway between 19 and 20.
        assert_relative_eq!(forest.predict_row(&[19.4, 1.0]), 10.0);
        assert_relative_eq!(forest.predict_row(&[19.6, 1.0]), 50.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = step_data();
        let config = ForestConfig {
            n_trees: 8,
            max_features: Some(1),
            ..ForestConfig::default()
        };

        let a = RandomForest::fit(&config, &x, &y);
        let b = RandomForest::fit(&config, &x, &y);

        assert_eq!(a, b);
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_different_seeds_give_different_forests() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..60).map(|i| f64::from(i * i % 17)).collect();
        let x = matrix(&rows);

        let a = RandomForest::fit(&ForestConfig::default(), &x, &y);
        let b = RandomForest::fit(
            &ForestConfig {
                seed: 7,
                ..ForestConfig::default()
            },
            &x,
            &y,
        );

        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_target_gives_single_leaf() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let y = vec![7.5; 10];

        let forest = RandomForest::fit(&ForestConfig::default(), &matrix(&rows), &y);

        for tree in forest.trees() {
            assert_eq!(tree.n_leaves(), 1);
        }
        assert_relative_eq!(forest.predict_row(&[100.0]), 7.5);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let rows: Vec<Vec<f64>> = (0..32).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..32).map(f64::from).collect();
        let config = ForestConfig {
            n_trees: 1,
            max_depth: Some(2),
            bootstrap: false,
            ..ForestConfig::default()
        };

        let forest = RandomForest::fit(&config, &matrix(&rows), &y);

        assert_eq!(forest.trees()[0].n_leaves(), 4);
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let mut y = vec![0.0; 10];
        y[0] = 100.0;
        let config = ForestConfig {
            n_trees: 1,
            min_samples_leaf: 3,
            max_depth: Some(1),
            bootstrap: false,
            ..ForestConfig::default()
        };

        let forest = RandomForest::fit(&config, &matrix(&rows), &y);

        // The outlier cannot be isolated; it shares a leaf with two others.
        assert_relative_eq!(forest.predict_row(&[0.0]), 100.0 / 3.0);
    }
}
