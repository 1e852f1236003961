//! Feature scaling

use serde::{Deserialize, Serialize};

use crate::profiling::stats::quantile;

/// How numerical features are scaled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    Standard,
    /// Median and interquartile range, used when most numerical columns carry outliers
    Robust,
}

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Parameters are learned from training rows only. A column with no spread
/// keeps scale 1.0 so that it is only centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    pub scale: f64,
}

impl StandardScaler {
    /// Fit on already-imputed training values (population std)
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                scale: 1.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        Self {
            mean,
            scale: if std > 1e-12 { std } else { 1.0 },
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    pub fn inverse_transform(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }
}

/// Robust scaling: (x - median) / IQR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    pub center: f64,
    pub scale: f64,
}

impl RobustScaler {
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                center: 0.0,
                scale: 1.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
        Self {
            center: quantile(&sorted, 0.5),
            scale: if iqr > 1e-12 { iqr } else { 1.0 },
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

/// Scaler chosen once per pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum NumericScaler {
    Standard(StandardScaler),
    Robust(RobustScaler),
}

impl NumericScaler {
    pub fn fit(method: ScalingMethod, values: &[f64]) -> Self {
        match method {
            ScalingMethod::Standard => NumericScaler::Standard(StandardScaler::fit(values)),
            ScalingMethod::Robust => NumericScaler::Robust(RobustScaler::fit(values)),
        }
    }

    pub fn method(&self) -> ScalingMethod {
        match self {
            NumericScaler::Standard(_) => ScalingMethod::Standard,
            NumericScaler::Robust(_) => ScalingMethod::Robust,
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        match self {
            NumericScaler::Standard(s) => s.transform(value),
            NumericScaler::Robust(s) => s.transform(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let scaler = StandardScaler::fit(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((scaler.mean - 3.0).abs() < 1e-12);
        assert!((scaler.scale - 2.0f64.sqrt()).abs() < 1e-12);
        assert!(scaler.transform(3.0).abs() < 1e-12);
        assert!((scaler.inverse_transform(scaler.transform(4.5)) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_values_are_only_centered() {
        let scaler = StandardScaler::fit(&[7.0, 7.0, 7.0]);
        assert_eq!(scaler.scale, 1.0);
        assert_eq!(scaler.transform(8.0), 1.0);
    }

    #[test]
    fn test_robust_scaler_uses_median_and_iqr() {
        let scaler = RobustScaler::fit(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert_eq!(scaler.center, 3.0);
        assert_eq!(scaler.scale, 2.0);
        assert_eq!(scaler.transform(5.0), 1.0);
    }

    #[test]
    fn test_robust_scaler_without_spread() {
        let scaler = RobustScaler::fit(&[4.0, 4.0, 4.0, 4.0, 9.0]);
        assert_eq!(scaler.scale, 1.0);
        assert_eq!(scaler.transform(4.0), 0.0);
    }

    #[test]
    fn test_numeric_scaler_dispatch() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        let robust = NumericScaler::fit(ScalingMethod::Robust, &values);
        let standard = NumericScaler::fit(ScalingMethod::Standard, &values);
        assert_eq!(robust.method(), ScalingMethod::Robust);
        assert_eq!(standard.method(), ScalingMethod::Standard);
        assert_eq!(robust.transform(3.0), 0.0);
        assert!((standard.transform(22.0)).abs() < 1e-12);
    }
}
