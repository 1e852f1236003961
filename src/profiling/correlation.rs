//! Pearson correlation over numerical columns

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::thresholds::NOTABLE_CORRELATION_THRESHOLD;

/// Symmetric correlation matrix over the numerical columns with nonzero variance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Row/column order of `values`
    pub columns: Vec<String>,
    /// `None` where the pairwise-complete rows carry no variance
    pub values: Vec<Vec<Option<f64>>>,
    /// Numerical columns left out because they have zero variance or fewer than two values
    pub excluded_columns: Vec<String>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.columns.len();
        (0..n).all(|i| (0..n).all(|j| self.values[i][j] == self.values[j][i]))
    }
}

/// A column pair whose |r| exceeds the notable threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub column_a: String,
    pub column_b: String,
    pub correlation: f64,
}

/// Pearson r over rows where both values are present
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Whether a column has at least two values and nonzero variance
pub fn has_variance(values: &[Option<f64>]) -> bool {
    let mut present = values.iter().flatten();
    match present.next() {
        Some(first) => present.any(|v| v != first),
        None => false,
    }
}

/// Build the matrix from (name, values) pairs, all of equal length
pub fn correlation_matrix(columns: &[(String, Vec<Option<f64>>)]) -> CorrelationMatrix {
    let (kept, excluded): (Vec<_>, Vec<_>) =
        columns.iter().partition(|(_, values)| has_variance(values));

    let n = kept.len();
    let upper: Vec<Vec<Option<f64>>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (i + 1..n)
                .map(|j| pearson(&kept[i].1, &kept[j].1))
                .collect()
        })
        .collect();

    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        values[i][i] = Some(1.0);
        for (offset, r) in upper[i].iter().enumerate() {
            let j = i + 1 + offset;
            values[i][j] = *r;
            values[j][i] = *r;
        }
    }

    CorrelationMatrix {
        columns: kept.iter().map(|(name, _)| name.clone()).collect(),
        values,
        excluded_columns: excluded.iter().map(|(name, _)| name.clone()).collect(),
    }
}

/// Pairs above the notable threshold, strongest first
pub fn notable_pairs(matrix: &CorrelationMatrix) -> Vec<CorrelationPair> {
    let n = matrix.columns.len();
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            if let Some(r) = matrix.values[i][j] {
                if r.abs() > NOTABLE_CORRELATION_THRESHOLD {
                    pairs.push(CorrelationPair {
                        column_a: matrix.columns[i].clone(),
                        column_b: matrix.columns[j].clone(),
                        correlation: r,
                    });
                }
            }
        }
    }
    pairs.sort_by(|a, b| {
        b.correlation
            .abs()
            .total_cmp(&a.correlation.abs())
            .then_with(|| a.column_a.cmp(&b.column_a))
            .then_with(|| a.column_b.cmp(&b.column_b))
    });
    pairs
}
