//! Isolation forest anomaly scoring
//!
//! Anomalies are isolated by fewer random axis-aligned splits than normal
//! points. Each tree is grown on a random subsample to a depth limit of
//! `ceil(log2(subsample))`; a sample's score is `-2^(-E[h(x)] / c(n))`, so
//! scores lie in [-1, 0) and lower is more anomalous. The decision offset is
//! the `contamination` quantile of the training scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::ModelError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the training set size
    pub max_samples: usize,
    /// Expected share of anomalies in the training data
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One isolation tree stored as an arena; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    fn grow(samples: &[Vec<f64>], indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(samples, indices, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        samples: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            size: indices.len(),
        });
        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Only features with spread can separate the node
        let dims = samples[indices[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|feature| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = samples[i][feature];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| samples[i][feature] <= threshold);

        let left = self.grow_node(samples, left, depth + 1, max_depth, rng);
        let right = self.grow_node(samples, right, depth + 1, max_depth, rng);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                TreeNode::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationForestParams,
    dims: usize,
    subsample: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub fn fit(samples: &[Vec<f64>], params: IsolationForestParams) -> Result<Self, ModelError> {
        if samples.len() < 2 {
            return Err(ModelError::Training(format!(
                "need at least 2 samples, got {}",
                samples.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(ModelError::Training("n_estimators must be positive".into()));
        }
        if !(0.0..0.5).contains(&params.contamination) {
            return Err(ModelError::Training(
                "contamination must lie within [0, 0.5)".into(),
            ));
        }

        let dims = samples[0].len();
        for row in samples {
            if row.len() != dims {
                return Err(ModelError::DimensionMismatch {
                    expected: dims,
                    found: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite);
            }
        }

        let subsample = params.max_samples.clamp(2, samples.len());
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let indices = rand::seq::index::sample(&mut rng, samples.len(), subsample).into_vec();
                IsolationTree::grow(samples, indices, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            params,
            dims,
            subsample,
            offset: 0.0,
            trees,
        };

        let training_scores: Vec<f64> = samples.iter().map(|s| forest.raw_score(s)).collect();
        forest.offset = quantile(&training_scores, forest.params.contamination);

        Ok(forest)
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn params(&self) -> &IsolationForestParams {
        &self.params
    }

    /// Scores below the offset are anomalies
    pub fn offset(&self) -> f64 {
        self.offset
    }

    fn raw_score(&self, sample: &[f64]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;
        -(2f64.powf(-mean_depth / average_path_length(self.subsample)))
    }

    /// Score a sample; fails on wrong dimensionality or non-finite values
    pub fn score_sample(&self, sample: &[f64]) -> Result<f64, ModelError> {
        if sample.len() != self.dims {
            return Err(ModelError::DimensionMismatch {
                expected: self.dims,
                found: sample.len(),
            });
        }
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(self.raw_score(sample))
    }

    pub fn is_anomaly(&self, score: f64) -> bool {
        score < self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Dense unit-square grid plus a few far-away points
    fn cluster() -> Vec<Vec<f64>> {
        let mut samples: Vec<Vec<f64>> = (0..195)
            .map(|i| vec![(i % 15) as f64 / 15.0, (i / 15) as f64 / 13.0])
            .collect();
        samples.extend((0..5).map(|i| vec![50.0 + i as f64, 50.0 + i as f64]));
        samples
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_point_scores_lower() {
        let forest = IsolationForest::fit(&cluster(), IsolationForestParams::default()).unwrap();
        let inside = forest.score_sample(&[0.5, 0.5]).unwrap();
        let outside = forest.score_sample(&[52.0, 52.0]).unwrap();
        assert!(outside < inside);
        assert!(forest.is_anomaly(outside));
        assert!(!forest.is_anomaly(inside));
        assert!((-1.0..0.0).contains(&outside));
    }

    #[test]
    fn test_training_is_deterministic() {
        let a = IsolationForest::fit(&cluster(), IsolationForestParams::default()).unwrap();
        let b = IsolationForest::fit(&cluster(), IsolationForestParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_samples() {
        let forest = IsolationForest::fit(&cluster(), IsolationForestParams::default()).unwrap();
        assert!(matches!(
            forest.score_sample(&[1.0]),
            Err(ModelError::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(
            forest.score_sample(&[f64::NAN, 0.0]),
            Err(ModelError::NonFinite)
        ));
        assert!(IsolationForest::fit(&[vec![1.0]], IsolationForestParams::default()).is_err());
    }
}
