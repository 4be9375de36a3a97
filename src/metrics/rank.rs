// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Rank-biased overlap (Webber, Moffat & Zobel, 2010).
//!
//! RBO compares two ranked lists that may differ in length and membership.
//! Agreement at depth `d` is weighted by `p^(d-1)`, so a small `p` looks
//! only at the top of the lists and `p → 1` weighs all depths evenly.

use super::MetricOutcome;
use crate::error::MetricError;
use crate::result::{MeasurementResult, RankedEntry, RankedGroups, Table};
use std::collections::HashSet;
use std::hash::Hash;

fn check_p(p: f64) -> Result<(), MetricError> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(MetricError::InvalidParameter {
            name: "p",
            reason: format!("persistence must be in (0, 1), got {}", p),
        })
    }
}

/// Prefix overlaps `|S[..d] ∩ L[..d]|` for `d = 1..=min(len)`.
fn prefix_overlaps<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<usize> {
    let depth = a.len().min(b.len());
    let mut seen_a: HashSet<&T> = HashSet::with_capacity(depth);
    let mut seen_b: HashSet<&T> = HashSet::with_capacity(depth);
    let mut overlap = 0;
    let mut out = Vec::with_capacity(depth);

    for (x, y) in a.iter().zip(b) {
        if seen_a.insert(x) && seen_b.contains(x) {
            overlap += 1;
        }
        if seen_b.insert(y) && seen_a.contains(y) {
            overlap += 1;
        }
        out.push(overlap);
    }
    out
}

/// `(1 - p) * Σ_{d=1..s} (X_d / d) * p^(d-1)` over the shorter length `s`.
pub fn rbo_truncated<T: Eq + Hash>(a: &[T], b: &[T], p: f64) -> f64 {
    let mut total = 0.0;
    let mut weight = 1.0;
    for (i, &x) in prefix_overlaps(a, b).iter().enumerate() {
        total += x as f64 / (i + 1) as f64 * weight;
        weight *= p;
    }
    total * (1.0 - p)
}

/// RBO of two ranked lists.
///
/// The truncated sum is completed with the weight `p^s` of all depths past
/// the shorter list, credited at the agreement reached at depth `s`. Identical
/// non-empty lists score exactly 1; an empty list scores 0.
pub fn rbo<T: Eq + Hash>(a: &[T], b: &[T], p: f64) -> f64 {
    let overlaps = prefix_overlaps(a, b);
    let s = overlaps.len();
    if s == 0 {
        return 0.0;
    }
    let agreement = overlaps[s - 1] as f64 / s as f64;
    rbo_truncated(a, b, p) + agreement * p.powf(s as f64)
}

/// Share of the total RBO weight carried by the top `depth` ranks.
///
/// Used to pick `p`; with `p = 0.9` the top 10 ranks carry about 86%.
pub fn rbo_weight(depth: usize, p: f64) -> MetricOutcome {
    check_p(p)?;
    if depth == 0 {
        return Err(MetricError::InvalidParameter {
            name: "depth",
            reason: "depth must be at least 1".to_string(),
        });
    }

    let d = depth as f64;
    let mut tail = 0.0;
    let mut power = 1.0;
    for i in 1..depth {
        power *= p;
        // Remaining terms no longer change the sum
        if power == 0.0 {
            break;
        }
        tail += power / i as f64;
    }
    Ok(1.0 - p.powf(d - 1.0) + ((1.0 - p) / p) * d * ((1.0 / (1.0 - p)).ln() - tail))
}

/// Entity ids of a ranked table in row order.
fn ranked_ids(table: &Table) -> Vec<String> {
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row.keys.is_empty() {
                i.to_string()
            } else {
                row.keys
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join("-")
            }
        })
        .collect()
}

fn ranked_table(result: &MeasurementResult) -> Result<&Table, MetricError> {
    result.as_table().ok_or(MetricError::NonNumeric {
        expected: "ranked table",
        found: result.kind_name(),
    })
}

fn ranked_groups(result: &MeasurementResult) -> Result<&RankedGroups, MetricError> {
    result.as_ranked().ok_or(MetricError::NonNumeric {
        expected: "ranked groups",
        found: result.kind_name(),
    })
}

/// RBO between two ranked tables, ranking by row order.
///
/// Scores use the extrapolated [`rbo`]. Callers comparing against reference
/// numbers computed with the plain truncated sum should use [`rbo_truncated`]
/// on the same ids.
pub fn rbo_score(gt: &MeasurementResult, sim: &MeasurementResult, p: f64) -> MetricOutcome {
    check_p(p)?;
    let gt_ids = ranked_ids(ranked_table(gt)?);
    let sim_ids = ranked_ids(ranked_table(sim)?);
    Ok(rbo(&gt_ids, &sim_ids, p))
}

/// Grouped RBO over two ranked-groups results.
pub fn rbo_for_te(
    gt: &MeasurementResult,
    sim: &MeasurementResult,
    selector: Option<&str>,
    p: f64,
    min_count: usize,
) -> MetricOutcome {
    grouped_rbo(ranked_groups(gt)?, ranked_groups(sim)?, selector, p, min_count)
}

fn entity_keys(ranking: &[RankedEntry]) -> Vec<String> {
    ranking.iter().map(|e| e.entity.key()).collect()
}

/// Mean RBO over ground-truth groups that also appear in the simulation.
///
/// Groups with fewer than `min_count` entities are skipped. Groups missing
/// from the simulation are skipped too and do not lower the score. An empty
/// simulation scores 0. Without a `selector` the ground truth must hold
/// exactly one.
pub fn grouped_rbo(
    gt: &RankedGroups,
    sim: &RankedGroups,
    selector: Option<&str>,
    p: f64,
    min_count: usize,
) -> MetricOutcome {
    check_p(p)?;
    let name = match selector {
        Some(name) => name.to_string(),
        None => {
            let mut names = gt.selectors();
            match (names.next(), names.next()) {
                (Some(only), None) => only.clone(),
                _ => return Err(MetricError::AmbiguousSelector(gt.len())),
            }
        }
    };

    let gt_groups = gt
        .selector(&name)
        .ok_or_else(|| MetricError::MissingSelector(name.clone()))?;
    if sim.is_empty() {
        return Ok(0.0);
    }
    let sim_groups = sim
        .selector(&name)
        .ok_or_else(|| MetricError::MissingSelector(name.clone()))?;

    let mut total = 0.0;
    let mut count = 0usize;
    for (group, ranking) in gt_groups {
        if ranking.len() < min_count {
            continue;
        }
        if let Some(sim_ranking) = sim_groups.get(group) {
            total += rbo(&entity_keys(ranking), &entity_keys(sim_ranking), p);
            count += 1;
        }
    }

    Ok(if count > 0 { total / count as f64 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Entity;
    use approx::assert_relative_eq;

    #[test]
    fn test_rbo_identical_is_one() {
        let x = ["a", "b", "c", "d"];
        for p in [0.1, 0.5, 0.9, 0.99] {
            assert_relative_eq!(rbo(&x, &x, p), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rbo_empty_is_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(rbo(&empty, &["a", "b"], 0.9), 0.0);
        assert_eq!(rbo(&["a"], &empty, 0.9), 0.0);
    }

    #[test]
    fn test_rbo_disjoint_is_zero() {
        assert_eq!(rbo(&["a", "b"], &["c", "d"], 0.9), 0.0);
    }

    #[test]
    fn test_rbo_truncated_sum() {
        // Overlaps: depth 1 -> 0, depth 2 -> 2
        let out = rbo_truncated(&["a", "b"], &["b", "a"], 0.5);
        assert_relative_eq!(out, 0.5 * (0.0 + 1.0 * 0.5));
        assert_relative_eq!(rbo(&["a", "b"], &["b", "a"], 0.5), 0.25 + 0.25);
    }

    #[test]
    fn test_rbo_top_weighted() {
        let gt = ["a", "b", "c", "d", "e"];
        let swapped_top = ["b", "a", "c", "d", "e"];
        let swapped_tail = ["a", "b", "c", "e", "d"];
        assert!(rbo(&gt, &swapped_tail, 0.9) > rbo(&gt, &swapped_top, 0.9));
    }

    #[test]
    fn test_rbo_weight_reference_value() {
        let w = rbo_weight(10, 0.9).unwrap();
        assert_relative_eq!(w, 0.8556, epsilon = 1e-4);
    }

    #[test]
    fn test_rbo_weight_monotone_in_depth() {
        let mut last = 0.0;
        for d in 1..30 {
            let w = rbo_weight(d, 0.9).unwrap();
            assert!(w > last && w < 1.0);
            last = w;
        }
    }

    #[test]
    fn test_rbo_weight_rejects_bad_input() {
        assert!(rbo_weight(0, 0.9).is_err());
        assert!(rbo_weight(10, 1.0).is_err());
        assert!(rbo_weight(10, 0.0).is_err());
    }

    #[test]
    fn test_rbo_score_tables() {
        let gt = Table::series("user", [("u1", 9.0), ("u2", 5.0), ("u3", 1.0)]).unwrap();
        let out = rbo_score(&gt.clone().into(), &gt.into(), 0.95).unwrap();
        assert_relative_eq!(out, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rbo_score_truncated_counterpart() {
        let gt = Table::series("user", [("u1", 9.0), ("u2", 5.0), ("u3", 1.0)]).unwrap();
        let ids = ranked_ids(&gt);
        // Same lists: the truncated sum only covers depths 1..=3
        assert_relative_eq!(rbo_truncated(&ids, &ids, 0.95), 1.0 - 0.95f64.powi(3), epsilon = 1e-12);
        assert_relative_eq!(rbo_score(&gt.clone().into(), &gt.into(), 0.95).unwrap(), rbo(&ids, &ids, 0.95));
    }

    #[test]
    fn test_rbo_weight_depth_beyond_i32() {
        let depth = i32::MAX as usize + 10;
        let w = rbo_weight(depth, 0.5).unwrap();
        assert!(w.is_finite());
        assert_relative_eq!(w, 1.0, epsilon = 1e-3);
    }

    fn groups(rankings: &[(&str, Vec<&str>)]) -> RankedGroups {
        let mut g = RankedGroups::new();
        for (group, ids) in rankings {
            g.insert(
                "user",
                *group,
                ids.iter().map(|id| RankedEntry::new(*id, 1.0)).collect(),
            );
        }
        g
    }

    #[test]
    fn test_grouped_rbo_ignores_missed_groups() {
        let gt = groups(&[("cve-1", vec!["a", "b"]), ("cve-2", vec!["c", "d"])]);
        let sim = groups(&[("cve-1", vec!["a", "b"])]);
        // cve-2 has no simulation counterpart and is left out of the mean
        let out = grouped_rbo(&gt, &sim, Some("user"), 0.9, 0).unwrap();
        assert_relative_eq!(out, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_grouped_rbo_min_count() {
        let gt = groups(&[("cve-1", vec!["a"]), ("cve-2", vec!["c", "d"])]);
        let sim = groups(&[("cve-1", vec!["z"]), ("cve-2", vec!["c", "d"])]);
        let all = grouped_rbo(&gt, &sim, None, 0.9, 0).unwrap();
        let big = grouped_rbo(&gt, &sim, None, 0.9, 2).unwrap();
        assert_relative_eq!(all, 0.5, epsilon = 1e-12);
        assert_relative_eq!(big, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_grouped_rbo_empty_simulation_scores_zero() {
        let gt = groups(&[("cve-1", vec!["a"])]);
        assert_eq!(grouped_rbo(&gt, &RankedGroups::new(), None, 0.9, 0), Ok(0.0));
    }

    #[test]
    fn test_grouped_rbo_selector_errors() {
        let gt = groups(&[("cve-1", vec!["a"])]).with_group("repo", "cve-1", vec![]);
        let sim = gt.clone();
        assert_eq!(
            grouped_rbo(&gt, &sim, None, 0.9, 0),
            Err(MetricError::AmbiguousSelector(2))
        );
        assert_eq!(
            grouped_rbo(&gt, &sim, Some("node"), 0.9, 0),
            Err(MetricError::MissingSelector("node".to_string()))
        );
    }

    #[test]
    fn test_grouped_rbo_pair_entities() {
        let pair = |a: &str, b: &str| RankedEntry {
            entity: Entity::Pair(a.to_string(), b.to_string()),
            score: 1.0,
        };
        let gt = RankedGroups::new().with_group("user", "g", vec![pair("u1", "r1"), pair("u2", "r2")]);
        let sim = RankedGroups::new().with_group(
            "user",
            "g",
            vec![RankedEntry::new("u1-r1", 1.0), RankedEntry::new("u2-r2", 1.0)],
        );
        let out = grouped_rbo(&gt, &sim, Some("user"), 0.9, 0).unwrap();
        assert_relative_eq!(out, 1.0, epsilon = 1e-12);
    }
}
