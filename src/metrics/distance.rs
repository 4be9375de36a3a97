// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Distance and goodness-of-fit metrics.

use super::MetricOutcome;
use crate::alignment::{self, FillValue, JoinKind};
use crate::error::MetricError;
use crate::result::MeasurementResult;
use crate::stats;
use nalgebra::DVector;

fn scalar(result: &MeasurementResult) -> Result<f64, MetricError> {
    result.as_scalar().ok_or(MetricError::NonNumeric {
        expected: "scalar",
        found: result.kind_name(),
    })
}

fn scalar_pair(gt: &MeasurementResult, sim: &MeasurementResult) -> Result<(f64, f64), MetricError> {
    let (g, s) = (scalar(gt)?, scalar(sim)?);
    if !g.is_finite() {
        return Err(MetricError::NonFinite {
            side: "ground truth",
        });
    }
    if !s.is_finite() {
        return Err(MetricError::NonFinite { side: "simulation" });
    }
    Ok((g, s))
}

/// `|sim - gt|` for two scalars.
pub fn absolute_difference(gt: &MeasurementResult, sim: &MeasurementResult) -> MetricOutcome {
    let (g, s) = scalar_pair(gt, sim)?;
    Ok((s - g).abs())
}

/// `100 * |sim - gt| / |gt|`; undefined when the ground truth is zero.
pub fn absolute_percentage_error(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
) -> MetricOutcome {
    let (g, s) = scalar_pair(gt, sim)?;
    if g == 0.0 {
        return Err(MetricError::ZeroDenominator {
            what: "ground truth",
        });
    }
    Ok(100.0 * (s - g).abs() / g.abs())
}

fn is_sequence(result: &MeasurementResult) -> bool {
    matches!(result, MeasurementResult::Sequence(_))
}

/// Two raw arrays compared position by position.
fn paired_arrays(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
) -> Result<(Vec<f64>, Vec<f64>), MetricError> {
    let g = alignment::normalize_input(gt)?;
    let s = alignment::normalize_input(sim)?;
    if g.len() != s.len() {
        return Err(MetricError::ShapeMismatch {
            ground_truth: g.len(),
            simulation: s.len(),
        });
    }
    Ok((g, s))
}

/// Aligned value columns: positional for sequences, joined for tables.
/// Pairs with a NaN cell are dropped.
fn aligned_columns(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    join: JoinKind,
    fill: FillValue,
) -> Result<(Vec<f64>, Vec<f64>), MetricError> {
    let (g, s) = if is_sequence(gt) || is_sequence(sim) {
        paired_arrays(gt, sim)?
    } else {
        let joined = alignment::join(gt, sim, join, fill)?;
        (joined.ground_truth(), joined.simulation())
    };
    Ok(g
        .into_iter()
        .zip(s)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .unzip())
}

fn root_mean_square(gt: &[f64], sim: &[f64]) -> f64 {
    let g = DVector::from_column_slice(gt);
    let s = DVector::from_column_slice(sim);
    ((s - g).norm_squared() / gt.len() as f64).sqrt()
}

/// Root mean squared error over aligned rows.
///
/// Sequence inputs are compared positionally with NaN read as 0. With
/// `relative`, the error is divided by the ground-truth interquartile range.
pub fn rmse(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    join: JoinKind,
    fill: FillValue,
    relative: bool,
) -> MetricOutcome {
    let (g, s) = if is_sequence(gt) || is_sequence(sim) {
        let (g, s) = paired_arrays(gt, sim)?;
        (
            g.into_iter().map(stats::nan_to_num).collect::<Vec<_>>(),
            s.into_iter().map(stats::nan_to_num).collect::<Vec<_>>(),
        )
    } else {
        aligned_columns(gt, sim, join, fill)?
    };

    if g.is_empty() {
        return Err(MetricError::EmptyInput { side: "aligned" });
    }

    let error = root_mean_square(&g, &s);
    if !relative {
        return Ok(error);
    }

    match stats::iqr(&g) {
        Some(range) if range > 0.0 => Ok(error / range),
        _ => Err(MetricError::ZeroDenominator {
            what: "ground-truth interquartile range",
        }),
    }
}

/// Coefficient of determination of the simulation against the ground truth.
///
/// Non-finite rows are dropped on both sides before the join; cells the
/// join leaves empty count as 0. Needs at least two aligned rows.
pub fn r2(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    join: JoinKind,
    fill: FillValue,
) -> MetricOutcome {
    if gt.is_empty() {
        return Err(MetricError::EmptyInput {
            side: "ground truth",
        });
    }
    if sim.is_empty() {
        return Err(MetricError::EmptyInput { side: "simulation" });
    }

    let (g, s): (Vec<f64>, Vec<f64>) = if is_sequence(gt) || is_sequence(sim) {
        let (g, s) = paired_arrays(gt, sim)?;
        g.into_iter()
            .zip(s)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .unzip()
    } else {
        let (gt_table, sim_table) = match (gt.as_table(), sim.as_table()) {
            (Some(g), Some(s)) => (g.finite_rows(), s.finite_rows()),
            _ => return Err(MetricError::MissingValueColumn),
        };
        let joined = alignment::join_tables(&gt_table, &sim_table, join, fill)?;
        let zero = |v: f64| if v.is_nan() { 0.0 } else { v };
        (
            joined.ground_truth().into_iter().map(zero).collect(),
            joined.simulation().into_iter().map(zero).collect(),
        )
    };

    if g.len() < 2 {
        return Err(MetricError::InsufficientRows {
            needed: 2,
            found: g.len(),
        });
    }

    let truth = DVector::from_vec(g);
    let pred = DVector::from_vec(s);
    let ss_res = (&truth - &pred).norm_squared();
    let ss_tot = truth.add_scalar(-truth.mean()).norm_squared();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Pearson correlation coefficient of the aligned value columns.
pub fn pearson(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    join: JoinKind,
    fill: FillValue,
) -> MetricOutcome {
    let (g, s) = aligned_columns(gt, sim, join, fill)?;
    if g.len() < 2 {
        return Err(MetricError::InsufficientRows {
            needed: 2,
            found: g.len(),
        });
    }

    let x = DVector::from_vec(g);
    let y = DVector::from_vec(s);
    let xc = x.add_scalar(-x.mean());
    let yc = y.add_scalar(-y.mean());
    let denom = xc.norm() * yc.norm();
    if denom == 0.0 || !denom.is_finite() {
        return Err(MetricError::ZeroDenominator { what: "variance" });
    }
    Ok((xc.dot(&yc) / denom).clamp(-1.0, 1.0))
}

/// Two-sample Kolmogorov–Smirnov statistic on the raw value arrays.
pub fn ks_test(gt: &MeasurementResult, sim: &MeasurementResult) -> MetricOutcome {
    let g = alignment::normalize_input(gt)?;
    let s = alignment::normalize_input(sim)?;
    ks_statistic(&g, &s)
}

/// Largest gap between the two empirical CDFs.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> MetricOutcome {
    if a.is_empty() {
        return Err(MetricError::EmptyInput {
            side: "ground truth",
        });
    }
    if b.is_empty() {
        return Err(MetricError::EmptyInput { side: "simulation" });
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite {
            side: "ground truth",
        });
    }
    if b.iter().any(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite { side: "simulation" });
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;

    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    Ok(d)
}
