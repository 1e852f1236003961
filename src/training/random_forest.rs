//! Random Forest implementation

use super::decision_tree::DecisionTree;
use super::EstimatorResult;
use crate::error::EstimatorError;
use crate::profiling::stats::quantile;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Lower and upper percentiles of per-tree predictions for the interval width
const INTERVAL_QUANTILES: (f64, f64) = (0.05, 0.95);

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Base seed; tree `i` uses `random_state + i`
    pub random_state: u64,
    /// Is classification task
    is_classification: bool,
    /// Number of classes (classification)
    n_classes: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    fn base(n_estimators: usize, is_classification: bool) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: 42,
            is_classification,
            n_classes: 0,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Create a new classifier forest; targets are class indices 0..k
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::base(n_estimators, true)
    }

    /// Create a new regressor forest
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::base(n_estimators, false)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Number of classes known from the full label set, even if absent from training rows
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    /// sqrt(n) features per split for classification, n/3 for regression
    fn compute_max_features(&self, n_features: usize) -> usize {
        let k = if self.is_classification {
            (n_features as f64).sqrt().ceil() as usize
        } else {
            (n_features as f64 / 3.0).ceil() as usize
        };
        k.clamp(1, n_features.max(1))
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(EstimatorError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < 2 {
            return Err(EstimatorError::TooFewSamples {
                required: 2,
                actual: n_samples,
            });
        }

        self.n_features = n_features;
        if self.is_classification {
            let observed = y.iter().fold(0usize, |acc, &v| acc.max(v as usize + 1));
            self.n_classes = self.n_classes.max(observed);
        }
        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state;

        // Build trees in parallel; each tree owns its seed so order of execution is irrelevant
        let trees: EstimatorResult<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = if self.is_classification {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                };
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree = tree
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());

                tree.fit_indices(x, y, &sample_indices)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                let tree_total: f64 = imp.sum();
                if tree_total <= 0.0 {
                    continue;
                }
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val / tree_total;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    fn tree_predictions(&self, x: &Array2<f64>) -> EstimatorResult<Vec<Array1<f64>>> {
        if self.trees.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        self.trees.par_iter().map(|tree| tree.predict(x)).collect()
    }

    /// Majority vote (lowest class on ties) or mean of tree outputs
    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        if self.is_classification {
            let proba = self.predict_proba(x)?;
            return Ok(proba
                .rows()
                .into_iter()
                .map(|row| {
                    let mut best = 0;
                    for (class, &p) in row.iter().enumerate() {
                        if p > row[best] {
                            best = class;
                        }
                    }
                    best as f64
                })
                .collect());
        }

        let all_predictions = self.tree_predictions(x)?;
        let n_trees = all_predictions.len() as f64;
        Ok((0..x.nrows())
            .map(|i| all_predictions.iter().map(|p| p[i]).sum::<f64>() / n_trees)
            .collect())
    }

    /// Class probabilities as vote fractions (classification only)
    pub fn predict_proba(&self, x: &Array2<f64>) -> EstimatorResult<Array2<f64>> {
        if !self.is_classification {
            return Err(EstimatorError::Unsupported(
                "predict_proba on a regression forest".to_string(),
            ));
        }
        let all_predictions = self.tree_predictions(x)?;
        let n_trees = all_predictions.len() as f64;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for preds in &all_predictions {
            for (i, &class) in preds.iter().enumerate() {
                proba[[i, class as usize]] += 1.0;
            }
        }
        proba.mapv_inplace(|votes: f64| votes / n_trees);
        Ok(proba)
    }

    /// Width between the 5th and 95th percentile of per-tree predictions (regression only)
    pub fn prediction_interval_width(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        let all_predictions = self.tree_predictions(x)?;
        Ok((0..x.nrows())
            .map(|i| {
                let mut values: Vec<f64> = all_predictions.iter().map(|p| p[i]).collect();
                values.sort_by(f64::total_cmp);
                quantile(&values, INTERVAL_QUANTILES.1) - quantile(&values, INTERVAL_QUANTILES.0)
            })
            .collect())
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new_classifier(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_regressor_interval() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rf = RandomForest::new_regressor(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 2.0, "MSE too high: {}", mse);

        let widths = rf.prediction_interval_width(&x).unwrap();
        assert!(widths.iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn test_predict_proba_sums_to_one() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [0.1, 0.0], [0.9, 1.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut rf = RandomForest::new_classifier(10)
            .with_random_state(42)
            .with_n_classes(3);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (4, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * 3 + j * 5) % 11) as f64);
        let y = Array1::from_shape_fn(30, |i| ((i * 3) % 11) as f64);
        let run = |seed| {
            let mut rf = RandomForest::new_regressor(8).with_random_state(seed);
            rf.fit(&x, &y).unwrap();
            rf.predict(&x).unwrap()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForest::new_regressor(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }
}
