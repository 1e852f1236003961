//! Linear models

use super::EstimatorResult;
use crate::error::EstimatorError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Logistic regression trained with L2-regularized batch gradient descent
///
/// Two classes fit a single model for class index 1. More classes fit one
/// model per class (one-vs-rest) and normalize the scores into probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, one vector per binary model
    pub coefficients: Vec<Array1<f64>>,
    /// Fitted intercepts, one per binary model
    pub intercepts: Vec<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of classes seen at fit time
    n_classes: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: Vec::new(),
            intercepts: Vec::new(),
            fit_intercept: true,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            n_classes: 0,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Number of classes known from the full label set
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.coefficients.is_empty()
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit on class indices 0..k
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(EstimatorError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(EstimatorError::TooFewSamples {
                required: 1,
                actual: 0,
            });
        }

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

        self.coefficients.clear();
        self.intercepts.clear();
        for class in positive_classes {
            let target = y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
            let (weights, bias) = self.fit_binary(x, &target)?;
            self.coefficients.push(weights);
            self.intercepts.push(bias);
        }

        Ok(self)
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> EstimatorResult<(Array1<f64>, f64)> {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        let lr = self.learning_rate;
        let alpha = self.alpha;

        for iteration in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (alpha * &weights);
            let db = if self.fit_intercept {
                errors.mean().unwrap_or(0.0)
            } else {
                0.0
            };

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !grad_norm.is_finite() {
                return Err(EstimatorError::Diverged {
                    iterations: iteration,
                });
            }
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        Ok((weights, bias))
    }

    /// Class probabilities, shape (n_samples, n_classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> EstimatorResult<Array2<f64>> {
        if !self.is_fitted() {
            return Err(EstimatorError::NotFitted);
        }
        let expected = self.coefficients[0].len();
        if x.ncols() != expected {
            return Err(EstimatorError::ShapeError {
                expected: format!("{} features", expected),
                actual: format!("{} features", x.ncols()),
            });
        }

        let scores: Vec<Array1<f64>> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| Self::sigmoid(&(x.dot(w) + *b)))
            .collect();

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        if self.n_classes == 2 {
            for (i, &p) in scores[0].iter().enumerate() {
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
        } else {
            for (class, s) in scores.iter().enumerate() {
                proba.column_mut(class).assign(s);
            }
            normalize_rows(&mut proba);
        }
        Ok(proba)
    }

    /// Predict class indices
    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Mean absolute coefficient per feature across the binary models
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if !self.is_fitted() {
            return None;
        }
        let stacked = ndarray::stack(
            Axis(0),
            &self.coefficients.iter().map(|c| c.view()).collect::<Vec<_>>(),
        )
        .ok()?;
        stacked.mapv(f64::abs).mean_axis(Axis(0))
    }
}

/// Scale each row to sum to 1; rows summing to zero become uniform
pub(crate) fn normalize_rows(proba: &mut Array2<f64>) {
    let n_cols = proba.ncols() as f64;
    for mut row in proba.rows_mut() {
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|p| p / sum);
        } else {
            row.fill(1.0 / n_cols);
        }
    }
}

/// Index of the largest entry per row, first index on ties
pub(crate) fn argmax_rows(proba: &Array2<f64>) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (j, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = j;
                }
            }
            best as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_binary() {
        let x = array![[0.0], [0.5], [1.0], [3.0], [3.5], [4.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 2));
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[5, 1]] > 0.5);
    }

    #[test]
    fn test_logistic_multiclass_probabilities() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [3.0, 0.0],
            [3.1, 0.2],
            [0.0, 3.0],
            [0.1, 3.2]
        ];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new().with_max_iter(2000);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(model.predict(&x).unwrap(), y);

        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 0.0];
        let mut model = LogisticRegression::new();
        assert_eq!(
            model.fit(&x, &y).unwrap_err(),
            EstimatorError::TooFewClasses(1)
        );
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(model.feature_importances().is_none());
        assert_eq!(
            model.predict(&array![[1.0]]).unwrap_err(),
            EstimatorError::NotFitted
        );
    }
}
