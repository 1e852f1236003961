//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Minimum child weight constraint
//!
//! Multi-class targets are fit one-vs-rest with normalized probabilities.

use super::linear_models::{argmax_rows, normalize_rows};
use super::EstimatorResult;
use crate::error::EstimatorError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn accumulate_gain(&self, totals: &mut [f64]) {
        if let XGBNode::Split {
            feature,
            gain,
            left,
            right,
            ..
        } = self
        {
            totals[*feature] += gain;
            left.accumulate_gain(totals);
            right.accumulate_gain(totals);
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();
    let leaf_weight = -g_sum / (h_sum + config.reg_lambda);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf {
            weight: leaf_weight,
        };
    }

    // Collect keeps feature order; the first feature wins among equal gains
    let candidates: Vec<Option<(usize, f64, f64)>> = feature_indices
        .par_iter()
        .map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .collect();
    let best_split = candidates
        .into_iter()
        .flatten()
        .fold(None, |best: Option<(usize, f64, f64)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        });

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf {
                    weight: leaf_weight,
                };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                gain: gain - config.gamma,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf {
            weight: leaf_weight,
        },
    }
}

/// Best (feature, threshold, gain) for a single feature using the exact greedy method
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();
    let lambda = config.reg_lambda;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for pos in 0..sorted_indices.len() - 1 {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        // No threshold between equal values
        if x[[idx, feature]] >= x[[next_idx, feature]] {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |(g, _)| gain > g) {
            best = Some((gain, (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0));
        }
    }

    best.map(|(gain, threshold)| (feature, threshold, gain))
}

/// Loss being boosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Objective {
    SquaredError,
    Logistic,
}

/// One additive ensemble of trees for a single output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Booster {
    trees: Vec<XGBNode>,
    base_score: f64,
    learning_rate: f64,
}

impl Booster {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        objective: Objective,
        config: &XGBoostConfig,
        rng: &mut Xoshiro256PlusPlus,
    ) -> EstimatorResult<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let base_score = match objective {
            Objective::SquaredError => y.mean().unwrap_or(0.0),
            Objective::Logistic => {
                let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
        };
        let mut raw_preds = Array1::from_elem(n_samples, base_score);
        let mut trees = Vec::with_capacity(config.n_estimators);

        for iteration in 0..config.n_estimators {
            let (grad, hess) = match objective {
                // grad = pred - y, hess = 1
                Objective::SquaredError => (&raw_preds - y, Array1::from_elem(n_samples, 1.0)),
                // grad = p - y, hess = p(1 - p)
                Objective::Logistic => {
                    let probs = raw_preds.mapv(sigmoid);
                    let hess = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));
                    (&probs - y, hess)
                }
            };

            let row_indices = subsample(rng, n_samples, config.subsample);
            let col_indices = subsample(rng, n_features, config.colsample_bytree);
            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, config);

            // Every row moves, including rows left out of this round's subsample
            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += config.learning_rate * tree.predict(row);
            }
            if raw_preds.iter().any(|v| !v.is_finite()) {
                return Err(EstimatorError::Diverged {
                    iterations: iteration + 1,
                });
            }

            trees.push(tree);
        }

        Ok(Self {
            trees,
            base_score,
            learning_rate: config.learning_rate,
        })
    }

    fn raw_predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|t| self.learning_rate * t.predict(row))
                        .sum::<f64>()
            })
            .collect()
    }

    fn accumulate_gain(&self, totals: &mut [f64]) {
        for tree in &self.trees {
            tree.accumulate_gain(totals);
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn check_shape(x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<()> {
    if x.nrows() != y.len() {
        return Err(EstimatorError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() < 2 {
        return Err(EstimatorError::TooFewSamples {
            required: 2,
            actual: x.nrows(),
        });
    }
    Ok(())
}

fn check_width(x: &Array2<f64>, n_features: usize) -> EstimatorResult<()> {
    if x.ncols() != n_features {
        return Err(EstimatorError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Normalized total split gain per feature
fn gain_importances(boosters: &[Booster], n_features: usize) -> Array1<f64> {
    let mut totals = vec![0.0f64; n_features];
    for booster in boosters {
        booster.accumulate_gain(&mut totals);
    }
    let total: f64 = totals.iter().sum();
    if total > 0.0 {
        for t in totals.iter_mut() {
            *t /= total;
        }
    }
    Array1::from_vec(totals)
}

// ─── XGBoost Regressor ─────────────────────────────────────────────────────

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    booster: Option<Booster>,
    n_features: usize,
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            booster: None,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<()> {
        check_shape(x, y)?;
        self.n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.booster = Some(Booster::fit(x, y, Objective::SquaredError, &self.config, &mut rng)?);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        let booster = self.booster.as_ref().ok_or(EstimatorError::NotFitted)?;
        check_width(x, self.n_features)?;
        Ok(booster.raw_predict(x))
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        let booster = self.booster.as_ref()?;
        Some(gain_importances(std::slice::from_ref(booster), self.n_features))
    }
}

// ─── XGBoost Classifier ────────────────────────────────────────────────────

/// XGBoost Classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    /// One booster for class 1 (binary) or one per class (one-vs-rest)
    boosters: Vec<Booster>,
    n_classes: usize,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            boosters: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    /// Number of classes known from the full label set
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Fit on class indices 0..k
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<()> {
        check_shape(x, y)?;
        self.n_features = x.ncols();
        let observed = y.iter().fold(0usize, |acc, &v| acc.max(v as usize + 1));
        self.n_classes = self.n_classes.max(observed);
        if self.n_classes < 2 {
            return Err(EstimatorError::TooFewClasses(self.n_classes));
        }

        let positive_classes: Vec<usize> = if self.n_classes == 2 {
            vec![1]
        } else {
            (0..self.n_classes).collect()
        };

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.boosters = positive_classes
            .into_iter()
            .map(|class| {
                let target = y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
                Booster::fit(x, &target, Objective::Logistic, &self.config, &mut rng)
            })
            .collect::<EstimatorResult<Vec<_>>>()?;
        Ok(())
    }

    /// Class probabilities, shape (n_samples, n_classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> EstimatorResult<Array2<f64>> {
        if self.boosters.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        check_width(x, self.n_features)?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        if self.n_classes == 2 {
            let p = self.boosters[0].raw_predict(x).mapv(sigmoid);
            for (i, &pi) in p.iter().enumerate() {
                proba[[i, 0]] = 1.0 - pi;
                proba[[i, 1]] = pi;
            }
        } else {
            for (class, booster) in self.boosters.iter().enumerate() {
                proba.column_mut(class).assign(&booster.raw_predict(x).mapv(sigmoid));
            }
            normalize_rows(&mut proba);
        }
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.boosters.is_empty() {
            return None;
        }
        Some(gain_importances(&self.boosters, self.n_features))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
