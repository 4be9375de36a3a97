// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Distributional divergences.
//!
//! Numeric samples are histogrammed on bin edges shared by both sides;
//! in discrete mode the inputs are category-count tables, outer-joined on
//! their category keys with absent categories counted as zero.

use super::MetricOutcome;
use crate::alignment::{self, BinMethod, FillValue, JoinKind};
use crate::error::MetricError;
use crate::result::MeasurementResult;
use crate::stats;

/// Histograms of both samples over shared edges.
fn shared_histograms(
    gt: &[f64],
    sim: &[f64],
    bins: BinMethod,
) -> Result<(Vec<f64>, Vec<f64>), MetricError> {
    let edges = alignment::shared_bins(gt, sim, bins)?;
    Ok((
        alignment::histogram(gt, &edges),
        alignment::histogram(sim, &edges),
    ))
}

/// Category counts aligned by key, absent categories as zero.
fn category_counts(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    finite_only: bool,
) -> Result<(Vec<f64>, Vec<f64>), MetricError> {
    let (g, s) = match (gt.as_table(), sim.as_table()) {
        (Some(g), Some(s)) if finite_only => (g.finite_rows(), s.finite_rows()),
        (Some(g), Some(s)) => (g.clone(), s.clone()),
        _ => return Err(MetricError::MissingValueColumn),
    };
    let joined = alignment::join_tables(&g, &s, JoinKind::Outer, FillValue::Constant(0.0))?;
    Ok((joined.ground_truth(), joined.simulation()))
}

fn to_pmf(counts: &[f64], what: &'static str) -> Result<Vec<f64>, MetricError> {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(MetricError::ZeroDenominator { what });
    }
    Ok(counts.iter().map(|c| c / total).collect())
}

fn check_base(base: Option<f64>) -> Result<(), MetricError> {
    match base {
        Some(b) if !(b > 0.0 && b != 1.0 && b.is_finite()) => Err(MetricError::InvalidParameter {
            name: "base",
            reason: format!("logarithm base must be positive and not 1, got {}", b),
        }),
        _ => Ok(()),
    }
}

/// Relative entropy with explicit diagnostics instead of `None`.
fn entropy(p: &[f64], q: &[f64], base: Option<f64>) -> MetricOutcome {
    if p.len() != q.len() {
        return Err(MetricError::ShapeMismatch {
            ground_truth: p.len(),
            simulation: q.len(),
        });
    }
    to_pmf(p, "ground-truth mass")?;
    to_pmf(q, "simulation mass")?;
    stats::relative_entropy(p, q, base).ok_or(MetricError::ZeroDenominator {
        what: "distribution mass",
    })
}

/// KL divergence D(ground truth ‖ simulation), natural log unless `base`.
///
/// May be `+∞` when the simulation leaves an occupied bin empty.
pub fn kl_divergence(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    discrete: bool,
    bins: BinMethod,
    base: Option<f64>,
) -> MetricOutcome {
    check_base(base)?;
    let (p, q) = if discrete {
        category_counts(gt, sim, false)?
    } else {
        let g = alignment::normalize_input(gt)?;
        let s = alignment::normalize_input(sim)?;
        shared_histograms(&g, &s, bins)?
    };
    entropy(&p, &q, base)
}

/// KL divergence against a simulation blended with a uniform component:
/// `(1 - alpha) * v + alpha` per bin.
pub fn kl_divergence_smoothed(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    alpha: f64,
    discrete: bool,
    bins: BinMethod,
) -> MetricOutcome {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(MetricError::InvalidParameter {
            name: "alpha",
            reason: format!("smoothing weight must be in [0, 1], got {}", alpha),
        });
    }

    let (p, q) = if discrete {
        let (g, s) = category_counts(gt, sim, false)?;
        (to_pmf(&g, "ground-truth mass")?, to_pmf(&s, "simulation mass")?)
    } else {
        let g = alignment::normalize_input(gt)?;
        let s = alignment::normalize_input(sim)?;
        shared_histograms(&g, &s, bins)?
    };

    let smoothed: Vec<f64> = q.iter().map(|v| (1.0 - alpha) * v + alpha).collect();
    entropy(&p, &smoothed, None)
}

/// Jensen–Shannon divergence, symmetric and bounded by 1 in base 2.
///
/// Non-finite values are dropped first.
pub fn js_divergence(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    discrete: bool,
    base: f64,
    bins: BinMethod,
) -> MetricOutcome {
    check_base(Some(base))?;
    if gt.is_empty() {
        return Err(MetricError::EmptyInput {
            side: "ground truth",
        });
    }
    if sim.is_empty() {
        return Err(MetricError::EmptyInput { side: "simulation" });
    }

    let (g, s) = if discrete {
        category_counts(gt, sim, true)?
    } else {
        let finite = |v: Vec<f64>| v.into_iter().filter(|x| x.is_finite()).collect::<Vec<_>>();
        let g = finite(alignment::normalize_input(gt)?);
        let s = finite(alignment::normalize_input(sim)?);
        if g.is_empty() {
            return Err(MetricError::NonFinite {
                side: "ground truth",
            });
        }
        if s.is_empty() {
            return Err(MetricError::NonFinite { side: "simulation" });
        }
        shared_histograms(&g, &s, bins)?
    };

    if g.len() != s.len() {
        return Err(MetricError::ShapeMismatch {
            ground_truth: g.len(),
            simulation: s.len(),
        });
    }
    let p = to_pmf(&g, "ground-truth mass")?;
    let q = to_pmf(&s, "simulation mass")?;
    let m: Vec<f64> = p.iter().zip(&q).map(|(a, b)| 0.5 * (a + b)).collect();

    Ok(entropy(&p, &m, Some(base))? / 2.0 + entropy(&q, &m, Some(base))? / 2.0)
}
