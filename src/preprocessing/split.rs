//! Deterministic train/test splitting

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::validate_test_fraction;
use crate::error::{AutoMlError, Result};

/// Row positions assigned to each side of the split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub stratified: bool,
}

/// Split `n` rows into train and test, shuffled with a ChaCha8 RNG seeded from `seed`
///
/// With class labels the split is stratified when every class has at least two rows
/// and the test side can hold one row per class; otherwise it is a plain shuffled split.
pub fn train_test_split(
    n: usize,
    labels: Option<&[usize]>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    validate_test_fraction(test_fraction)?;
    // Tolerance keeps products like 10 * 0.7 from rounding up past the exact value
    let n_test = ((n as f64) * test_fraction - 1e-9).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AutoMlError::InsufficientData {
            rows: n,
            minimum: 2,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    if let Some(labels) = labels {
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(row);
        }
        let can_stratify =
            by_class.values().all(|rows| rows.len() >= 2) && n_test >= by_class.len();
        if can_stratify {
            return Ok(stratified(by_class, n, n_test, &mut rng));
        }
    }

    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(&mut rng);
    let mut test = rows[..n_test].to_vec();
    let mut train = rows[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok(TrainTestSplit {
        train,
        test,
        stratified: false,
    })
}

fn stratified(
    by_class: BTreeMap<usize, Vec<usize>>,
    n: usize,
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> TrainTestSplit {
    // Proportional allocation with at least one test row per class, at most n_c - 1
    let mut allocations: Vec<(usize, Vec<usize>, usize, f64)> = by_class
        .into_iter()
        .map(|(class, mut rows)| {
            rows.shuffle(&mut *rng);
            let exact = rows.len() as f64 * n_test as f64 / n as f64;
            let take = (exact.floor() as usize).clamp(1, rows.len() - 1);
            (class, rows, take, exact - exact.floor())
        })
        .collect();

    let mut allocated: usize = allocations.iter().map(|a| a.2).sum();
    // Hand out remaining test slots by largest remainder, then class order
    let mut order: Vec<usize> = (0..allocations.len()).collect();
    order.sort_by(|&a, &b| {
        allocations[b]
            .3
            .total_cmp(&allocations[a].3)
            .then_with(|| allocations[a].0.cmp(&allocations[b].0))
    });
    while allocated < n_test {
        let mut progressed = false;
        for &i in &order {
            if allocated >= n_test {
                break;
            }
            if allocations[i].2 < allocations[i].1.len() - 1 {
                allocations[i].2 += 1;
                allocated += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    while allocated > n_test {
        let mut progressed = false;
        for &i in order.iter().rev() {
            if allocated <= n_test {
                break;
            }
            if allocations[i].2 > 1 {
                allocations[i].2 -= 1;
                allocated -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (_, rows, take, _) in allocations {
        test.extend_from_slice(&rows[..take]);
        train.extend_from_slice(&rows[take..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    TrainTestSplit {
        train,
        test,
        stratified: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_split_sizes() {
        let split = train_test_split(10, None, 0.25, 7).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 7);
        assert!(!split.stratified);
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = train_test_split(50, None, 0.2, 42).unwrap();
        let b = train_test_split(50, None, 0.2, 42).unwrap();
        let c = train_test_split(50, None, 0.2, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_stratified_keeps_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| if i < 60 { 0 } else { 1 }).collect();
        let split = train_test_split(100, Some(&labels), 0.2, 42).unwrap();
        assert!(split.stratified);
        assert_eq!(split.test.len(), 20);
        let positives = split.test.iter().filter(|&&r| labels[r] == 1).count();
        assert_eq!(positives, 8);
    }

    #[test]
    fn test_singleton_class_falls_back() {
        let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let split = train_test_split(10, Some(&labels), 0.2, 1).unwrap();
        assert!(!split.stratified);
    }

    #[test]
    fn test_bad_fraction() {
        assert!(matches!(
            train_test_split(10, None, 1.0, 1),
            Err(AutoMlError::InvalidParameter { .. })
        ));
    }
}
