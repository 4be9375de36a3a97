// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Small descriptive-statistics helpers shared by the metric library.

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in `[0, 100]`. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, q))
}

pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Interquartile range (75th minus 25th percentile).
pub fn iqr(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, 75.0) - percentile_sorted(&sorted, 25.0))
}

/// NaN → 0, ±∞ → ±`f64::MAX`.
pub fn nan_to_num(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value == f64::INFINITY {
        f64::MAX
    } else if value == f64::NEG_INFINITY {
        f64::MIN
    } else {
        value
    }
}

/// Relative entropy D(p‖q) of two non-negative weight vectors.
///
/// Both vectors are normalized to sum 1 first. Terms with `p = 0` contribute
/// nothing; `p > 0, q = 0` makes the divergence infinite. The result is in
/// nats, or in `base` units when given. Returns `None` if the lengths differ
/// or either vector sums to zero.
pub fn relative_entropy(p: &[f64], q: &[f64], base: Option<f64>) -> Option<f64> {
    if p.len() != q.len() {
        return None;
    }
    let p_sum: f64 = p.iter().sum();
    let q_sum: f64 = q.iter().sum();
    if p_sum <= 0.0 || q_sum <= 0.0 {
        return None;
    }

    let mut total = 0.0;
    for (&pi, &qi) in p.iter().zip(q) {
        let (pi, qi) = (pi / p_sum, qi / q_sum);
        if pi > 0.0 {
            if qi > 0.0 {
                total += pi * (pi / qi).ln();
            } else {
                return Some(f64::INFINITY);
            }
        }
    }

    Some(match base {
        Some(b) => total / b.ln(),
        None => total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        assert_relative_eq!(std_dev(&values), 2.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_percentile_linear() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&values, 25.0).unwrap(), 1.75);
        assert_relative_eq!(percentile(&values, 75.0).unwrap(), 3.25);
        assert_relative_eq!(iqr(&values).unwrap(), 1.5);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_nan_to_num() {
        assert_eq!(nan_to_num(f64::NAN), 0.0);
        assert_eq!(nan_to_num(f64::INFINITY), f64::MAX);
        assert_eq!(nan_to_num(-1.5), -1.5);
    }

    #[test]
    fn test_relative_entropy_identical_is_zero() {
        let p = [1.0, 2.0, 3.0];
        assert_eq!(relative_entropy(&p, &p, None), Some(0.0));
    }

    #[test]
    fn test_relative_entropy_known_value() {
        // D([0.5, 0.5] || [0.25, 0.75]) in bits
        let d = relative_entropy(&[1.0, 1.0], &[1.0, 3.0], Some(2.0)).unwrap();
        let expected = 0.5 * (2.0f64).log2() + 0.5 * (2.0f64 / 3.0).log2();
        assert_relative_eq!(d, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_relative_entropy_edge_cases() {
        assert_eq!(
            relative_entropy(&[1.0, 1.0], &[1.0, 0.0], None),
            Some(f64::INFINITY)
        );
        assert_eq!(relative_entropy(&[0.0, 1.0], &[1.0, 1.0], None).map(|d| d > 0.0), Some(true));
        assert_eq!(relative_entropy(&[0.0, 0.0], &[1.0, 1.0], None), None);
        assert_eq!(relative_entropy(&[1.0], &[1.0, 1.0], None), None);
    }
}
