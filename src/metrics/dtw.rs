// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Dynamic time warping.
//!
//! Both variants use `|a - b|` as the per-step cost and poll a
//! [`CancelToken`] so a quadratic run can be abandoned.

use super::MetricOutcome;
use crate::alignment::{self, FillValue, JoinKind};
use crate::cancel::CancelToken;
use crate::error::MetricError;
use crate::result::MeasurementResult;
use std::collections::{HashMap, HashSet};

/// Cells between cancellation polls in the windowed solver.
const POLL_INTERVAL: usize = 4096;

/// Warp path as (ground-truth index, simulation index) pairs.
pub type WarpPath = Vec<(usize, usize)>;

/// Exact DTW over the outer-joined, zero-filled series.
///
/// Non-table inputs are compared as raw arrays.
pub fn dtw(gt: &MeasurementResult, sim: &MeasurementResult, cancel: &CancelToken) -> MetricOutcome {
    let (g, s) = match alignment::join(gt, sim, JoinKind::Outer, FillValue::Constant(0.0)) {
        Ok(joined) => (joined.ground_truth(), joined.simulation()),
        Err(MetricError::MissingValueColumn) => (
            alignment::normalize_input(gt)?,
            alignment::normalize_input(sim)?,
        ),
        Err(e) => return Err(e),
    };

    if s.is_empty() {
        return Err(MetricError::EmptyInput { side: "simulation" });
    }
    if g.is_empty() {
        return Err(MetricError::EmptyInput {
            side: "ground truth",
        });
    }
    dtw_distance(&g, &s, cancel)
}

/// FastDTW on the raw value arrays, no join.
pub fn fast_dtw(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    radius: usize,
    cancel: &CancelToken,
) -> MetricOutcome {
    let g = alignment::normalize_input(gt)?;
    let s = alignment::normalize_input(sim)?;
    if g.is_empty() {
        return Err(MetricError::EmptyInput {
            side: "ground truth",
        });
    }
    if s.is_empty() {
        return Err(MetricError::EmptyInput { side: "simulation" });
    }
    Ok(fastdtw(&g, &s, radius, cancel)?.0)
}

/// Full DTW cost matrix, kept two rows at a time.
pub fn dtw_distance(x: &[f64], y: &[f64], cancel: &CancelToken) -> MetricOutcome {
    let m = y.len();
    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;

    for &xi in x {
        cancel.check()?;
        curr[0] = f64::INFINITY;
        for j in 1..=m {
            let cost = (xi - y[j - 1]).abs();
            curr[j] = cost + prev[j].min(curr[j - 1]).min(prev[j - 1]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    Ok(prev[m])
}

/// Multi-resolution approximate DTW.
///
/// Series shorter than `radius + 2` are solved exactly; longer ones are
/// halved, solved recursively, and the coarse path is projected back and
/// widened by `radius` to bound the search window at full resolution.
/// `radius` must be at least 1.
pub fn fastdtw(
    x: &[f64],
    y: &[f64],
    radius: usize,
    cancel: &CancelToken,
) -> Result<(f64, WarpPath), MetricError> {
    if radius == 0 {
        return Err(MetricError::InvalidParameter {
            name: "radius",
            reason: "search radius must be at least 1".to_string(),
        });
    }
    let min_size = radius + 2;
    if x.len() < min_size || y.len() < min_size {
        return windowed_dtw(x, y, None, cancel);
    }

    let x_half = reduce_by_half(x);
    let y_half = reduce_by_half(y);
    let (_, path) = fastdtw(&x_half, &y_half, radius, cancel)?;
    let window = expand_window(&path, x.len(), y.len(), radius);
    windowed_dtw(x, y, Some(&window), cancel)
}

fn reduce_by_half(x: &[f64]) -> Vec<f64> {
    x.chunks_exact(2).map(|p| (p[0] + p[1]) / 2.0).collect()
}

fn expand_window(path: &[(usize, usize)], len_x: usize, len_y: usize, radius: usize) -> WarpPath {
    let r = radius as isize;
    let mut neighbourhood: HashSet<(isize, isize)> = HashSet::new();
    for &(i, j) in path {
        let (i, j) = (i as isize, j as isize);
        for a in -r..=r {
            for b in -r..=r {
                neighbourhood.insert((i + a, j + b));
            }
        }
    }

    let mut projected: HashSet<(usize, usize)> = HashSet::new();
    for &(i, j) in &neighbourhood {
        if i < 0 || j < 0 {
            continue;
        }
        let (i, j) = (i as usize * 2, j as usize * 2);
        projected.extend([(i, j), (i, j + 1), (i + 1, j), (i + 1, j + 1)]);
    }

    // Keep one contiguous run of columns per row, starting where the
    // previous row's run started
    let mut window = Vec::new();
    let mut start_j = 0;
    for i in 0..len_x {
        let mut new_start = None;
        for j in start_j..len_y {
            if projected.contains(&(i, j)) {
                window.push((i, j));
                new_start.get_or_insert(j);
            } else if new_start.is_some() {
                break;
            }
        }
        start_j = new_start.unwrap_or(start_j);
    }
    window
}

/// DTW restricted to `window` (all cells when `None`), with the warp path.
fn windowed_dtw(
    x: &[f64],
    y: &[f64],
    window: Option<&[(usize, usize)]>,
    cancel: &CancelToken,
) -> Result<(f64, WarpPath), MetricError> {
    let (len_x, len_y) = (x.len(), y.len());
    let full: Vec<(usize, usize)>;
    let cells = match window {
        Some(w) => w,
        None => {
            full = (0..len_x)
                .flat_map(|i| (0..len_y).map(move |j| (i, j)))
                .collect();
            &full
        }
    };

    // (cost, predecessor i, predecessor j), indices shifted by one
    let mut table: HashMap<(usize, usize), (f64, usize, usize)> =
        HashMap::with_capacity(cells.len() + 1);
    table.insert((0, 0), (0.0, 0, 0));
    let cost_at = |t: &HashMap<(usize, usize), (f64, usize, usize)>, i: usize, j: usize| {
        t.get(&(i, j)).map_or(f64::INFINITY, |c| c.0)
    };

    for (n, &(i, j)) in cells.iter().enumerate() {
        if n % POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        let (i, j) = (i + 1, j + 1);
        let dt = (x[i - 1] - y[j - 1]).abs();

        let mut best = (cost_at(&table, i - 1, j) + dt, i - 1, j);
        let left = (cost_at(&table, i, j - 1) + dt, i, j - 1);
        if left.0 < best.0 {
            best = left;
        }
        let diag = (cost_at(&table, i - 1, j - 1) + dt, i - 1, j - 1);
        if diag.0 < best.0 {
            best = diag;
        }
        table.insert((i, j), best);
    }

    let distance = cost_at(&table, len_x, len_y);
    let mut path = Vec::new();
    let (mut i, mut j) = (len_x, len_y);
    while !(i == 0 && j == 0) {
        path.push((i - 1, j - 1));
        let &(_, pi, pj) = table.get(&(i, j)).ok_or_else(|| MetricError::InvalidParameter {
            name: "radius",
            reason: format!("search window lost the warp path at ({}, {})", i, j),
        })?;
        i = pi;
        j = pj;
    }
    path.reverse();

    Ok((distance, path))
}
