//! Missing-value imputation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profiling::stats::quantile;

/// Strategy for filling missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Training mean (numerical and datetime columns)
    Mean,
    /// Training median, used when numerical columns are heavily incomplete
    Median,
    /// Most frequent training value, smallest on ties (categorical and boolean columns)
    MostFrequent,
}

/// Fills missing numbers with the training mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    pub fill: f64,
}

impl MeanImputer {
    /// `None` when there is nothing to learn from
    pub fn fit(values: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }
        Some(Self {
            fill: present.iter().sum::<f64>() / present.len() as f64,
        })
    }

    pub fn transform(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.fill)
    }
}

/// Fills missing numbers with the training median
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    pub fill: f64,
}

impl MedianImputer {
    pub fn fit(values: &[Option<f64>]) -> Option<Self> {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }
        present.sort_by(f64::total_cmp);
        Some(Self {
            fill: quantile(&present, 0.5),
        })
    }

    pub fn transform(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.fill)
    }
}

/// Numeric imputer chosen once per pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum NumericImputer {
    Mean(MeanImputer),
    Median(MedianImputer),
}

impl NumericImputer {
    /// `strategy` must be `Mean` or `Median`; anything else falls back to the mean
    pub fn fit(strategy: ImputeStrategy, values: &[Option<f64>]) -> Option<Self> {
        match strategy {
            ImputeStrategy::Median => MedianImputer::fit(values).map(NumericImputer::Median),
            ImputeStrategy::Mean | ImputeStrategy::MostFrequent => {
                MeanImputer::fit(values).map(NumericImputer::Mean)
            }
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        match self {
            NumericImputer::Mean(_) => ImputeStrategy::Mean,
            NumericImputer::Median(_) => ImputeStrategy::Median,
        }
    }

    pub fn fill(&self) -> f64 {
        match self {
            NumericImputer::Mean(i) => i.fill,
            NumericImputer::Median(i) => i.fill,
        }
    }

    pub fn transform(&self, value: Option<f64>) -> f64 {
        value.unwrap_or_else(|| self.fill())
    }
}

/// Fills missing values with the most frequent training value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeImputer<T> {
    pub fill: T,
}

impl<T: Ord + Clone> ModeImputer<T> {
    pub fn fit<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Option<T>>,
        T: 'a,
    {
        let mut counts: BTreeMap<&T, usize> = BTreeMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }
        // BTreeMap iterates in ascending order, so the first maximum wins ties
        let mut best: Option<(&T, usize)> = None;
        for (value, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| Self {
            fill: value.clone(),
        })
    }

    pub fn transform(&self, value: Option<T>) -> T {
        value.unwrap_or_else(|| self.fill.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_imputer() {
        let imputer = MeanImputer::fit(&[Some(1.0), None, Some(3.0)]).unwrap();
        assert_eq!(imputer.fill, 2.0);
        assert_eq!(imputer.transform(None), 2.0);
        assert_eq!(imputer.transform(Some(5.0)), 5.0);
        assert!(MeanImputer::fit(&[None, None]).is_none());
    }

    #[test]
    fn test_median_imputer_ignores_extremes() {
        let imputer = MedianImputer::fit(&[Some(1.0), Some(1000.0), None, Some(3.0), Some(2.0)]).unwrap();
        assert_eq!(imputer.fill, 2.5);
        assert_eq!(imputer.transform(None), 2.5);
        assert!(MedianImputer::fit(&[None]).is_none());
    }

    #[test]
    fn test_numeric_imputer_follows_strategy() {
        let values = [Some(1.0), Some(2.0), Some(9.0), None];
        let mean = NumericImputer::fit(ImputeStrategy::Mean, &values).unwrap();
        let median = NumericImputer::fit(ImputeStrategy::Median, &values).unwrap();
        assert_eq!(mean.strategy(), ImputeStrategy::Mean);
        assert_eq!(mean.transform(None), 4.0);
        assert_eq!(median.strategy(), ImputeStrategy::Median);
        assert_eq!(median.transform(None), 2.0);
        assert_eq!(median.transform(Some(7.0)), 7.0);
    }

    #[test]
    fn test_mode_imputer_ties_pick_smallest() {
        let values = vec![
            Some("b".to_string()),
            Some("a".to_string()),
            None,
            Some("b".to_string()),
            Some("a".to_string()),
        ];
        let imputer = ModeImputer::fit(&values).unwrap();
        assert_eq!(imputer.fill, "a");
        assert_eq!(imputer.transform(None), "a");
    }

    #[test]
    fn test_mode_imputer_bool() {
        let values = vec![Some(true), Some(true), Some(false), None];
        let imputer = ModeImputer::fit(&values).unwrap();
        assert!(imputer.fill);
    }
}
