//! Support Vector Machine implementations
//!
//! Provides an SVM classifier trained with SMO (Sequential Minimal Optimization),
//! one-vs-rest for more than two classes, and an epsilon-insensitive regressor.
//! Neither exposes calibrated probabilities.

use super::EstimatorResult;
use crate::error::EstimatorError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
pub const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: 1.0 }
    }
}

impl KernelType {
    fn apply(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::RBF { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }

    /// Full kernel matrix, rows computed in parallel
    fn matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| self.apply(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }
}

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Random seed for SMO partner selection
    pub random_state: u64,
    /// Epsilon for regression (SVR tube width, in standardized target units)
    pub epsilon: f64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
            epsilon: 0.1,
        }
    }
}

impl SVMConfig {
    /// RBF kernel with gamma = 1 / n_features
    pub fn rbf_for(n_features: usize) -> KernelType {
        KernelType::RBF {
            gamma: 1.0 / n_features.max(1) as f64,
        }
    }
}

fn check_samples(x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<()> {
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
    if x.nrows() > MAX_KERNEL_MATRIX_SAMPLES {
        return Err(EstimatorError::TooManySamples {
            actual: x.nrows(),
            limit: MAX_KERNEL_MATRIX_SAMPLES,
        });
    }
    Ok(())
}

/// A single binary SVM; labels are +1 / -1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    /// alpha_i * y_i per support vector
    dual_coef: Array1<f64>,
    bias: f64,
}

impl BinarySVM {
    fn score(&self, kernel: &KernelType, sample: ArrayView1<f64>) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.dual_coef.iter())
            .map(|(sv, coef)| coef * kernel.apply(sv, sample))
            .sum::<f64>()
            + self.bias
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    /// One model for class 1 (binary) or one per class (one-vs-rest)
    models: Vec<BinarySVM>,
    n_classes: usize,
    n_features: usize,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
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
        check_samples(x, y)?;
        let observed = y.iter().fold(0usize, |acc, &v| acc.max(v as usize + 1));
        self.n_classes = self.n_classes.max(observed);
        if self.n_classes < 2 {
            return Err(EstimatorError::TooFewClasses(self.n_classes));
        }
        self.n_features = x.ncols();

        let kernel_matrix = self.config.kernel.matrix(x);
        let positive_classes: Vec<usize> = if self.n_classes == 2 {
            vec![1]
        } else {
            (0..self.n_classes).collect()
        };

        self.models = positive_classes
            .into_iter()
            .map(|class| {
                let y_binary = y.mapv(|v| if v as usize == class { 1.0 } else { -1.0 });
                let seed = self.config.random_state.wrapping_add(class as u64);
                self.smo_train(x, &y_binary, &kernel_matrix, seed)
            })
            .collect::<EstimatorResult<Vec<_>>>()?;
        Ok(())
    }

    /// SMO training algorithm
    fn smo_train(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        kernel_matrix: &Array2<f64>,
        seed: u64,
    ) -> EstimatorResult<BinarySVM> {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * kernel_matrix[[i, idx]];
                }
            }
            sum
        };

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];

                // KKT violation
                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };

                    let e_j = decision(&alphas, bias, j) - y[j];
                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alphas[j] - alphas[i]).max(0.0), (c + alphas[j] - alphas[i]).min(c))
                    } else {
                        ((alphas[i] + alphas[j] - c).max(0.0), (alphas[i] + alphas[j]).min(c))
                    };
                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel_matrix[[i, j]] - kernel_matrix[[i, i]] - kernel_matrix[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] = (alphas[j] - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }
                    alphas[i] += y[i] * y[j] * (alpha_j_old - alphas[j]);

                    let b1 = bias
                        - e_i
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, i]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[i, j]];
                    let b2 = bias
                        - e_j
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, j]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[j, j]];

                    bias = if alphas[i] > 0.0 && alphas[i] < c {
                        b1
                    } else if alphas[j] > 0.0 && alphas[j] < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };
                    if !bias.is_finite() {
                        return Err(EstimatorError::Diverged {
                            iterations: total_iter,
                        });
                    }

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        let support_indices: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        let mut support_vectors = Array2::zeros((support_indices.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support_indices.len());
        for (k, &idx) in support_indices.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            dual_coef[k] = alphas[idx] * y[idx];
        }

        Ok(BinarySVM {
            support_vectors,
            dual_coef,
            bias,
        })
    }

    /// Decision scores, shape (n_samples, n_models)
    pub fn decision_function(&self, x: &Array2<f64>) -> EstimatorResult<Array2<f64>> {
        if self.models.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(EstimatorError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let mut scores = Array2::zeros((x.nrows(), self.models.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, model) in self.models.iter().enumerate() {
                scores[[i, k]] = model.score(&self.config.kernel, row);
            }
        }
        Ok(scores)
    }

    /// Predict class indices (binary sign, or best one-vs-rest score)
    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        let scores = self.decision_function(x)?;
        if self.n_classes == 2 {
            return Ok(scores.column(0).mapv(|s| if s >= 0.0 { 1.0 } else { 0.0 }));
        }
        Ok(super::linear_models::argmax_rows(&scores))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.models.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

/// Support Vector Regressor
///
/// The target is standardized internally so `epsilon` and the step size
/// behave the same for any target scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    model: Option<BinarySVM>,
    y_mean: f64,
    y_scale: f64,
    n_features: usize,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            model: None,
            y_mean: 0.0,
            y_scale: 1.0,
            n_features: 0,
        }
    }

    /// Fit with coordinate steps on the epsilon-insensitive loss
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<()> {
        check_samples(x, y)?;
        let n = x.nrows();
        self.n_features = x.ncols();

        self.y_mean = y.mean().unwrap_or(0.0);
        let std = y.std(0.0);
        self.y_scale = if std > 1e-12 { std } else { 1.0 };
        let ys = y.mapv(|v| (v - self.y_mean) / self.y_scale);

        let kernel_matrix = self.config.kernel.matrix(x);
        let c = self.config.c;
        let epsilon = self.config.epsilon;
        let learning_rate: f64 = 0.01;

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut alphas_star: Array1<f64> = Array1::zeros(n);
        let mut bias: f64 = 0.0;
        // Kernel part of each training prediction, kept in sync with the alphas
        let mut kernel_part: Array1<f64> = Array1::zeros(n);

        for iteration in 0..self.config.max_iter {
            let mut max_change: f64 = 0.0;

            for i in 0..n {
                let error = kernel_part[i] + bias - ys[i];

                let delta = if error > epsilon {
                    let new_val = (alphas_star[i] + learning_rate).min(c);
                    let step = new_val - alphas_star[i];
                    alphas_star[i] = new_val;
                    -step
                } else if error < -epsilon {
                    let new_val = (alphas[i] + learning_rate).min(c);
                    let step = new_val - alphas[i];
                    alphas[i] = new_val;
                    step
                } else {
                    0.0
                };
                if delta != 0.0 {
                    kernel_part.scaled_add(delta, &kernel_matrix.column(i));
                    max_change = max_change.max(delta.abs());
                }

                let bias_update = learning_rate * 0.1 * error;
                max_change = max_change.max(bias_update.abs());
                bias -= bias_update;
            }

            if !bias.is_finite() {
                return Err(EstimatorError::Diverged {
                    iterations: iteration + 1,
                });
            }
            if max_change < self.config.tol {
                break;
            }
        }

        let combined = &alphas - &alphas_star;
        let support_indices: Vec<usize> = (0..n).filter(|&i| combined[i].abs() > 1e-8).collect();
        let mut support_vectors = Array2::zeros((support_indices.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support_indices.len());
        for (k, &idx) in support_indices.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            dual_coef[k] = combined[idx];
        }

        self.model = Some(BinarySVM {
            support_vectors,
            dual_coef,
            bias,
        });
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        let model = self.model.as_ref().ok_or(EstimatorError::NotFitted)?;
        if x.ncols() != self.n_features {
            return Err(EstimatorError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| model.score(&self.config.kernel, row) * self.y_scale + self.y_mean)
            .collect())
    }

    pub fn n_support_vectors(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.support_vectors.nrows())
    }
}
