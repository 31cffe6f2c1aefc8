//! Isolation Forest Detector - Short-horizon ensemble layer
//!
//! Unsupervised isolation-based ensemble scoring each feature vector
//! independently. Anomalous points isolate in few random splits, so
//! shorter average path lengths mean higher anomaly. The raw anomaly
//! score is `2^(-E[h(x)]/c(n))`, with the decision function offset at
//! the contamination percentile of training scores.
//!
//! Scores are min-max rescaled to [0, 100] across the batch being
//! scored: within one call the least anomalous point maps near 100 and
//! the most anomalous near 0. The same absolute anomaly can therefore
//! map differently depending on batch composition; the training-time
//! decision range is recorded in the fitted state for callers that want
//! a fixed reference instead.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::percentile;
use super::scaler::StandardScaler;
use crate::config::IsolationConfig;
use crate::constants::{EPSILON, TRAINING_SEED};
use crate::error::SddError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search in `n` points;
/// normalizes path lengths across sub-sample sizes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(data: &Array2<f64>, rows: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::grow_node(data, rows, 0, max_depth, rng),
        }
    }

    fn grow_node(
        data: &Array2<f64>,
        rows: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        if rows.len() <= 1 || depth >= max_depth {
            return Node::Leaf { size: rows.len() };
        }

        // Features with spread in this partition.
        let splittable: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|col| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for &row in rows {
                    let v = data[[row, col]];
                    min = min.min(v);
                    max = max.max(v);
                }
                (max > min).then_some((col, min, max))
            })
            .collect();

        if splittable.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
        let value = rng.gen_range(min..max);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&row| data[[row, feature]] < value);

        Node::Split {
            feature,
            value,
            left: Box::new(Self::grow_node(data, &left_rows, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow_node(data, &right_rows, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, point: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if point[*feature] < *value { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Trained forest state; immutable after fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedForest {
    scaler: StandardScaler,
    trees: Vec<IsolationTree>,
    /// Actual per-tree sub-sample size (may be below the configured cap).
    sub_sample: usize,
    /// Decision-function offset at the contamination percentile.
    offset: f64,
    /// Decision-function range observed on training data.
    pub train_score_range: (f64, f64),
}

/// Short-horizon ensemble anomaly detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestDetector {
    config: IsolationConfig,
    fitted: Option<FittedForest>,
}

impl IsolationForestDetector {
    pub fn new(config: IsolationConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    pub(crate) fn fitted_state(&self) -> Option<&FittedForest> {
        self.fitted.as_ref()
    }

    pub(crate) fn from_fitted(config: IsolationConfig, fitted: FittedForest) -> Self {
        Self {
            config,
            fitted: Some(fitted),
        }
    }

    /// Train on standardized healthy-baseline features.
    pub fn fit(&mut self, features: &Array2<f64>) {
        let (scaler, scaled) = StandardScaler::fit_transform(features);

        let n = scaled.nrows();
        let sub_sample = self.config.max_samples.min(n).max(1);
        let max_depth = (sub_sample as f64).log2().ceil().max(1.0) as usize;

        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            let rows = rand::seq::index::sample(&mut rng, n, sub_sample).into_vec();
            trees.push(IsolationTree::grow(&scaled, &rows, max_depth, &mut rng));
        }

        let mut fitted = FittedForest {
            scaler,
            trees,
            sub_sample,
            offset: 0.0,
            train_score_range: (0.0, 0.0),
        };

        let train_scores: Vec<f64> = scaled
            .rows()
            .into_iter()
            .map(|row| fitted.score_sample(row))
            .collect();
        fitted.offset = percentile(&train_scores, 100.0 * self.config.contamination);

        let decisions: Vec<f64> = train_scores.iter().map(|s| s - fitted.offset).collect();
        let min = decisions.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = decisions.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        fitted.train_score_range = (min, max);

        log::info!(
            "isolation forest trained: {} trees, sub-sample {}, offset {:.4}",
            self.config.n_estimators,
            sub_sample,
            fitted.offset
        );
        self.fitted = Some(fitted);
    }

    /// Score each row, min-max normalized to [0, 100] across this batch
    /// (100 = least anomalous). A degenerate batch where all raw scores
    /// coincide maps uniformly to 0 via the epsilon guard; no NaN/Inf
    /// ever escapes.
    pub fn score(&self, features: &Array2<f64>) -> Result<Vec<f64>, SddError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(SddError::ModelNotReady("isolation forest is untrained"))?;

        let scaled = fitted.scaler.transform(features);
        let decisions: Vec<f64> = scaled
            .rows()
            .into_iter()
            .map(|row| fitted.score_sample(row) - fitted.offset)
            .collect();

        let min = decisions.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = decisions.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Ok(decisions
            .iter()
            .map(|s| 100.0 * (s - min) / (max - min + EPSILON))
            .collect())
    }
}

impl Default for IsolationForestDetector {
    fn default() -> Self {
        Self::new(IsolationConfig::default())
    }
}

impl FittedForest {
    /// Feature width the forest was trained on.
    pub(crate) fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Raw anomaly score: `-2^(-E[h(x)]/c(n))`, higher = more normal.
    fn score_sample(&self, point: ArrayView1<f64>) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;

        let c = average_path_length(self.sub_sample);
        -(2.0_f64.powf(-mean_path / c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand_distr_free::gaussian_cluster;

    // Small deterministic gaussian cluster without extra dependencies.
    mod rand_distr_free {
        use ndarray::Array2;
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        pub fn gaussian_cluster(n: usize, dims: usize, seed: u64) -> Array2<f64> {
            let mut rng = StdRng::seed_from_u64(seed);
            Array2::from_shape_fn((n, dims), |_| {
                // Box-Muller
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
            })
        }
    }

    fn small_config() -> IsolationConfig {
        IsolationConfig {
            n_estimators: 50,
            contamination: 0.05,
            max_samples: 128,
        }
    }

    #[test]
    fn untrained_detector_refuses_to_score() {
        let detector = IsolationForestDetector::new(small_config());
        let err = detector.score(&Array2::zeros((2, 3))).unwrap_err();
        assert!(matches!(err, SddError::ModelNotReady(_)));
    }

    #[test]
    fn planted_outlier_scores_lowest() {
        let train = gaussian_cluster(300, 4, 7);
        let mut detector = IsolationForestDetector::new(small_config());
        detector.fit(&train);

        let mut test = gaussian_cluster(50, 4, 11);
        // Plant a far outlier in the last row.
        for col in 0..4 {
            test[[49, col]] = 12.0;
        }

        let scores = detector.score(&test).unwrap();
        let outlier = scores[49];
        let min_inlier = scores[..49].iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(
            outlier < min_inlier,
            "outlier {outlier:.2} should be below inliers (min {min_inlier:.2})"
        );
        assert!(scores.iter().all(|s| (0.0..=100.0).contains(s)));
    }

    #[test]
    fn degenerate_batch_produces_no_nan() {
        let train = gaussian_cluster(100, 3, 3);
        let mut detector = IsolationForestDetector::new(small_config());
        detector.fit(&train);

        let constant = Array2::from_elem((5, 3), 0.25);
        let scores = detector.score(&constant).unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
        // All raw scores coincide, so the epsilon guard maps them to ~0.
        assert!(scores.iter().all(|s| s.abs() < 1.0));
    }

    #[test]
    fn training_is_reproducible() {
        let train = gaussian_cluster(200, 4, 5);
        let test = gaussian_cluster(30, 4, 9);

        let mut a = IsolationForestDetector::new(small_config());
        let mut b = IsolationForestDetector::new(small_config());
        a.fit(&train);
        b.fit(&train);

        assert_eq!(a.score(&test).unwrap(), b.score(&test).unwrap());
    }

    #[test]
    fn average_path_length_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ~ 10.2 per the isolation forest paper.
        let c = average_path_length(256);
        assert!((c - 10.2).abs() < 0.2, "c(256) = {c}");
    }
}
