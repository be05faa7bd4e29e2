//! Holdout split and regression metrics for the training report

use ndarray::ArrayView1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a seeded stream and carve off `test_fraction` of it.
/// Both sides keep at least one row when `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let fraction = test_fraction.clamp(0.0, 1.0);
    let mut test_size = (n as f64 * fraction).round() as usize;
    if n >= 2 {
        test_size = test_size.clamp(1, n - 1);
    }

    let test = indices.split_off(n - test_size.min(n));
    Split {
        train: indices,
        test,
    }
}

/// Coefficient of determination: 1 - SS_res / SS_tot.
/// A constant target scores 1.0 when predicted exactly, otherwise 0.0.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }

    let mean = y_true.sum() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Mean Absolute Error: (1/n) * Σ|y_true - y_pred|
pub fn mean_absolute_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).abs())
        .sum::<f64>()
        / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_split_partitions_all_rows() {
        let split = train_test_split(50, 0.2, 42);
        assert_eq!(split.test.len(), 10);
        assert_eq!(split.train.len(), 40);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(30, 0.3, 7), train_test_split(30, 0.3, 7));
        assert_ne!(train_test_split(30, 0.3, 7), train_test_split(30, 0.3, 8));
    }

    #[test]
    fn test_split_keeps_both_sides_non_empty() {
        let split = train_test_split(3, 0.01, 1);
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.train.len(), 2);
    }

    #[test]
    fn test_r2_perfect_and_mean_baseline() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(y.view(), y.view()), 1.0);

        let baseline = array![2.5, 2.5, 2.5, 2.5];
        assert!(r2_score(y.view(), baseline.view()).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![0.5, 0.5];
        assert_eq!(r2_score(y.view(), y.view()), 1.0);
        assert_eq!(r2_score(y.view(), array![0.4, 0.6].view()), 0.0);
    }

    #[test]
    fn test_mae() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![1.5, 2.0, 2.0];
        assert!((mean_absolute_error(y.view(), p.view()) - 0.5).abs() < 1e-12);
    }
}
