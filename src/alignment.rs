// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Alignment of ground-truth and simulation results.
//!
//! Tables are joined on their key columns so the two `value` columns line up
//! row by row; numeric samples share histogram bin edges so the two
//! histograms are directly comparable.

use crate::error::MetricError;
use crate::result::{Key, MeasurementResult, Table};
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Upper bound on estimator-chosen bin counts.
pub const MAX_BINS: usize = 1 << 20;

/// Which keys survive a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Keys present on both sides.
    #[default]
    Inner,
    /// Union of keys.
    Outer,
    /// All ground-truth keys.
    Left,
    /// All simulation keys.
    Right,
}

impl FromStr for JoinKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinKind::Inner),
            "outer" => Ok(JoinKind::Outer),
            "left" => Ok(JoinKind::Left),
            "right" => Ok(JoinKind::Right),
            other => Err(MetricError::InvalidParameter {
                name: "join",
                reason: format!("unknown join kind '{}'", other),
            }),
        }
    }
}

/// Named policy for filling gaps from neighbouring rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    /// Carry the last seen value down.
    ForwardFill,
    /// Pull the next seen value up.
    BackwardFill,
}

impl FillStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillStrategy::ForwardFill => "ffill",
            FillStrategy::BackwardFill => "bfill",
        }
    }
}

impl FromStr for FillStrategy {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ffill" | "pad" => Ok(FillStrategy::ForwardFill),
            "bfill" | "backfill" => Ok(FillStrategy::BackwardFill),
            other => Err(MetricError::InvalidParameter {
                name: "fill_value",
                reason: format!("'{}' is neither a number nor a fill strategy", other),
            }),
        }
    }
}

/// How missing cells are filled after a join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FillRepr", into = "FillRepr")]
pub enum FillValue {
    Constant(f64),
    Strategy(FillStrategy),
}

impl Default for FillValue {
    fn default() -> Self {
        FillValue::Constant(0.0)
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Constant(v) => write!(f, "{}", v),
            FillValue::Strategy(s) => f.write_str(s.as_str()),
        }
    }
}

impl FromStr for FillValue {
    type Err = MetricError;

    /// Numbers are constants; anything else must name a strategy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<f64>() {
            Ok(v) => Ok(FillValue::Constant(v)),
            Err(_) => Ok(FillValue::Strategy(s.parse()?)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FillRepr {
    Number(f64),
    Name(String),
}

impl TryFrom<FillRepr> for FillValue {
    type Error = MetricError;

    fn try_from(repr: FillRepr) -> Result<Self, Self::Error> {
        match repr {
            FillRepr::Number(v) => Ok(FillValue::Constant(v)),
            FillRepr::Name(name) => name.parse(),
        }
    }
}

impl From<FillValue> for FillRepr {
    fn from(fill: FillValue) -> Self {
        match fill {
            FillValue::Constant(v) => FillRepr::Number(v),
            FillValue::Strategy(s) => FillRepr::Name(s.as_str().to_string()),
        }
    }
}

/// One joined row: shared keys plus both value cells.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub keys: Vec<Key>,
    pub ground_truth: f64,
    pub simulation: f64,
}

/// Output of [`join`], sorted by the shared key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    columns: Vec<String>,
    rows: Vec<AlignedRow>,
}

impl Joined {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ground-truth value column.
    pub fn ground_truth(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.ground_truth).collect()
    }

    /// Simulation value column.
    pub fn simulation(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.simulation).collect()
    }
}

/// Join two table results on the ground truth's key columns.
///
/// Fails if either side is not a table.
pub fn join(
    ground_truth: &MeasurementResult,
    simulation: &MeasurementResult,
    kind: JoinKind,
    fill: FillValue,
) -> Result<Joined, MetricError> {
    let gt = ground_truth
        .as_table()
        .ok_or(MetricError::MissingValueColumn)?;
    let sim = simulation
        .as_table()
        .ok_or(MetricError::MissingValueColumn)?;
    join_tables(gt, sim, kind, fill)
}

/// Join two tables; duplicate keys pair up as a cartesian product.
pub fn join_tables(
    ground_truth: &Table,
    simulation: &Table,
    kind: JoinKind,
    fill: FillValue,
) -> Result<Joined, MetricError> {
    let columns = ground_truth.columns();
    if columns.is_empty() {
        return Err(MetricError::NoKeyColumns);
    }

    // Simulation key cells reordered to the ground truth's column order
    let sim_positions = columns
        .iter()
        .map(|c| {
            simulation
                .column_index(c)
                .ok_or_else(|| MetricError::MissingKeyColumn(c.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups: BTreeMap<Vec<Key>, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in ground_truth.rows() {
        groups.entry(row.keys.clone()).or_default().0.push(row.value);
    }
    for row in simulation.rows() {
        let keys: Vec<Key> = sim_positions.iter().map(|&i| row.keys[i].clone()).collect();
        groups.entry(keys).or_default().1.push(row.value);
    }

    let keep_gt_only = matches!(kind, JoinKind::Outer | JoinKind::Left);
    let keep_sim_only = matches!(kind, JoinKind::Outer | JoinKind::Right);

    let mut rows = Vec::new();
    for (keys, (gt_values, sim_values)) in groups {
        match (gt_values.is_empty(), sim_values.is_empty()) {
            (false, false) => {
                for &g in &gt_values {
                    for &s in &sim_values {
                        rows.push(AlignedRow {
                            keys: keys.clone(),
                            ground_truth: g,
                            simulation: s,
                        });
                    }
                }
            }
            (false, true) if keep_gt_only => {
                rows.extend(gt_values.iter().map(|&g| AlignedRow {
                    keys: keys.clone(),
                    ground_truth: g,
                    simulation: f64::NAN,
                }));
            }
            (true, false) if keep_sim_only => {
                rows.extend(sim_values.iter().map(|&s| AlignedRow {
                    keys: keys.clone(),
                    ground_truth: f64::NAN,
                    simulation: s,
                }));
            }
            _ => {}
        }
    }

    apply_fill(&mut rows, fill);

    Ok(Joined {
        columns: columns.to_vec(),
        rows,
    })
}

fn apply_fill(rows: &mut [AlignedRow], fill: FillValue) {
    match fill {
        FillValue::Constant(c) => {
            for row in rows.iter_mut() {
                if row.ground_truth.is_nan() {
                    row.ground_truth = c;
                }
                if row.simulation.is_nan() {
                    row.simulation = c;
                }
            }
        }
        FillValue::Strategy(FillStrategy::ForwardFill) => {
            carry(rows.iter_mut(), |r| &mut r.ground_truth);
            carry(rows.iter_mut(), |r| &mut r.simulation);
        }
        FillValue::Strategy(FillStrategy::BackwardFill) => {
            carry(rows.iter_mut().rev(), |r| &mut r.ground_truth);
            carry(rows.iter_mut().rev(), |r| &mut r.simulation);
        }
    }
}

/// Propagate the last seen non-NaN cell over following NaN cells.
fn carry<'a, I, F>(rows: I, cell: F)
where
    I: Iterator<Item = &'a mut AlignedRow>,
    F: Fn(&mut AlignedRow) -> &mut f64,
{
    let mut last: Option<f64> = None;
    for row in rows {
        let value = cell(row);
        if value.is_nan() {
            if let Some(v) = last {
                *value = v;
            }
        } else {
            last = Some(*value);
        }
    }
}

/// Histogram bin-width rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinMethod {
    /// Smaller of Freedman–Diaconis and Sturges.
    #[default]
    Auto,
    /// Sturges corrected for skew; robust on skewed samples.
    Doane,
    Sturges,
    /// Freedman–Diaconis (IQR based).
    Fd,
    Scott,
    Rice,
    Sqrt,
    /// Fixed number of equal-width bins.
    Count(usize),
}

impl FromStr for BinMethod {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BinMethod::Auto),
            "doane" => Ok(BinMethod::Doane),
            "sturges" => Ok(BinMethod::Sturges),
            "fd" => Ok(BinMethod::Fd),
            "scott" => Ok(BinMethod::Scott),
            "rice" => Ok(BinMethod::Rice),
            "sqrt" => Ok(BinMethod::Sqrt),
            other => other
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .map(BinMethod::Count)
                .ok_or_else(|| MetricError::InvalidParameter {
                    name: "bins",
                    reason: format!("unknown binning rule '{}'", other),
                }),
        }
    }
}

/// Bin edges computed over both samples together.
pub fn shared_bins(a: &[f64], b: &[f64], method: BinMethod) -> Result<Vec<f64>, MetricError> {
    let mut data: Vec<f64> = a.iter().chain(b).copied().collect();
    if data.is_empty() {
        return Err(MetricError::EmptyInput { side: "combined" });
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite { side: "combined" });
    }
    // Sorted so the edges do not depend on argument order
    data.sort_by(|x, y| x.total_cmp(y));
    bin_edges(&data, method)
}

fn bin_edges(data: &[f64], method: BinMethod) -> Result<Vec<f64>, MetricError> {
    let (min, max) = min_max(data);
    let (mut first, mut last) = (min, max);
    if first == last {
        first -= 0.5;
        last += 0.5;
    }

    let n_bins = match method {
        BinMethod::Count(n) if n > MAX_BINS => {
            return Err(MetricError::InvalidParameter {
                name: "bins",
                reason: format!("{} bins requested, at most {} allowed", n, MAX_BINS),
            });
        }
        BinMethod::Count(n) => n.max(1),
        _ => {
            let width = bin_width(data, method);
            if width > 0.0 {
                let n = ((last - first) / width).ceil();
                if !n.is_finite() || n > MAX_BINS as f64 {
                    return Err(MetricError::InvalidParameter {
                        name: "bins",
                        reason: format!("{:?} rule asks for {} bins", method, n),
                    });
                }
                (n as usize).max(1)
            } else {
                1
            }
        }
    };

    let step = (last - first) / n_bins as f64;
    let mut edges: Vec<f64> = (0..=n_bins).map(|i| first + i as f64 * step).collect();
    edges[n_bins] = last;
    Ok(edges)
}

fn bin_width(data: &[f64], method: BinMethod) -> f64 {
    let n = data.len() as f64;
    let (min, max) = min_max(data);
    let ptp = max - min;

    match method {
        BinMethod::Sqrt => ptp / n.sqrt(),
        BinMethod::Sturges => ptp / (n.log2() + 1.0),
        BinMethod::Rice => ptp / (2.0 * n.cbrt()),
        BinMethod::Scott => (24.0 * std::f64::consts::PI.sqrt() / n).cbrt() * stats::std_dev(data),
        BinMethod::Fd => 2.0 * stats::iqr(data).unwrap_or(0.0) / n.cbrt(),
        BinMethod::Doane => {
            if data.len() <= 2 {
                return 0.0;
            }
            let sg1 = (6.0 * (n - 2.0) / ((n + 1.0) * (n + 3.0))).sqrt();
            let sigma = stats::std_dev(data);
            if sigma <= 0.0 {
                return 0.0;
            }
            let m = stats::mean(data);
            let g1 = data.iter().map(|x| ((x - m) / sigma).powi(3)).sum::<f64>() / n;
            ptp / (1.0 + n.log2() + (1.0 + g1.abs() / sg1).log2())
        }
        BinMethod::Auto => {
            let fd = bin_width(data, BinMethod::Fd);
            let sturges = bin_width(data, BinMethod::Sturges);
            if fd > 0.0 {
                fd.min(sturges)
            } else {
                sturges
            }
        }
        BinMethod::Count(_) => 0.0,
    }
}

fn min_max(data: &[f64]) -> (f64, f64) {
    data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

/// Count values per bin. Bins are half-open except the last.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<f64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let n_bins = edges.len() - 1;
    let (lo, hi) = (edges[0], edges[n_bins]);
    let mut counts = vec![0.0; n_bins];

    for &v in values {
        if !v.is_finite() || v < lo || v > hi {
            continue;
        }
        let idx = edges.partition_point(|&e| e <= v).saturating_sub(1);
        counts[idx.min(n_bins - 1)] += 1.0;
    }
    counts
}

/// Plain numeric array from a table's value column or a raw sequence.
pub fn normalize_input(result: &MeasurementResult) -> Result<Vec<f64>, MetricError> {
    match result {
        MeasurementResult::Table(t) => Ok(t.values()),
        MeasurementResult::Sequence(v) => Ok(v.clone()),
        other => Err(MetricError::NonNumeric {
            expected: "table or sequence",
            found: other.kind_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(points: &[(&str, f64)]) -> MeasurementResult {
        Table::series("date", points.iter().map(|&(k, v)| (k, v)))
            .unwrap()
            .into()
    }

    #[test]
    fn test_inner_join_disjoint_keys_is_empty() {
        let gt = daily(&[("d1", 1.0), ("d2", 2.0)]);
        let sim = daily(&[("d3", 1.0), ("d4", 2.0)]);
        let joined = join(&gt, &sim, JoinKind::Inner, FillValue::default()).unwrap();
        assert!(joined.is_empty());
    }

    #[test]
    fn test_outer_join_fills_union() {
        let gt = daily(&[("d2", 2.0), ("d1", 1.0)]);
        let sim = daily(&[("d3", 30.0), ("d2", 20.0)]);
        let joined = join(&gt, &sim, JoinKind::Outer, FillValue::Constant(-1.0)).unwrap();

        let keys: Vec<String> = joined.rows().iter().map(|r| r.keys[0].to_string()).collect();
        assert_eq!(keys, vec!["d1", "d2", "d3"]);
        assert_eq!(joined.ground_truth(), vec![1.0, 2.0, -1.0]);
        assert_eq!(joined.simulation(), vec![-1.0, 20.0, 30.0]);
    }

    #[test]
    fn test_left_and_right_joins() {
        let gt = daily(&[("d1", 1.0), ("d2", 2.0)]);
        let sim = daily(&[("d2", 20.0), ("d3", 30.0)]);

        let left = join(&gt, &sim, JoinKind::Left, FillValue::default()).unwrap();
        assert_eq!(left.ground_truth(), vec![1.0, 2.0]);
        assert_eq!(left.simulation(), vec![0.0, 20.0]);

        let right = join(&gt, &sim, JoinKind::Right, FillValue::default()).unwrap();
        assert_eq!(right.ground_truth(), vec![2.0, 0.0]);
        assert_eq!(right.simulation(), vec![20.0, 30.0]);
    }

    #[test]
    fn test_forward_fill_leaves_leading_gap() {
        let gt = daily(&[("d2", 2.0), ("d3", 3.0)]);
        let sim = daily(&[("d1", 10.0), ("d3", 30.0)]);
        let fill: FillValue = "ffill".parse().unwrap();
        let joined = join(&gt, &sim, JoinKind::Outer, fill).unwrap();

        let gt_col = joined.ground_truth();
        assert!(gt_col[0].is_nan());
        assert_eq!(&gt_col[1..], &[2.0, 3.0]);
        assert_eq!(joined.simulation(), vec![10.0, 10.0, 30.0]);
    }

    #[test]
    fn test_backward_fill() {
        let gt = daily(&[("d1", 1.0), ("d3", 3.0)]);
        let sim = daily(&[("d2", 20.0), ("d3", 30.0)]);
        let joined = join(&gt, &sim, JoinKind::Outer, "bfill".parse().unwrap()).unwrap();
        assert_eq!(joined.ground_truth(), vec![1.0, 3.0, 3.0]);
        assert_eq!(joined.simulation(), vec![20.0, 20.0, 30.0]);
    }

    #[test]
    fn test_duplicate_keys_form_product() {
        let gt = daily(&[("d1", 1.0), ("d1", 2.0)]);
        let sim = daily(&[("d1", 10.0), ("d1", 20.0)]);
        let joined = join(&gt, &sim, JoinKind::Inner, FillValue::default()).unwrap();
        assert_eq!(joined.len(), 4);
    }

    #[test]
    fn test_multi_column_join_reorders_simulation_keys() {
        let mut gt = Table::new(["node", "date"]).unwrap();
        gt.push(vec!["a".into(), "d1".into()], 1.0).unwrap();
        let mut sim = Table::new(["date", "node"]).unwrap();
        sim.push(vec!["d1".into(), "a".into()], 5.0).unwrap();

        let joined = join_tables(&gt, &sim, JoinKind::Inner, FillValue::default()).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.rows()[0].simulation, 5.0);
    }

    #[test]
    fn test_join_errors() {
        let table = daily(&[("d1", 1.0)]);
        let seq = MeasurementResult::Sequence(vec![1.0]);
        assert_eq!(
            join(&table, &seq, JoinKind::Inner, FillValue::default()),
            Err(MetricError::MissingValueColumn)
        );

        let other = Table::series("node", [("a", 1.0)]).unwrap();
        let err = join(&table, &other.into(), JoinKind::Inner, FillValue::default()).unwrap_err();
        assert_eq!(err, MetricError::MissingKeyColumn("date".to_string()));
    }

    #[test]
    fn test_fill_value_parsing() {
        assert_eq!("0".parse::<FillValue>().unwrap(), FillValue::Constant(0.0));
        assert_eq!(
            "pad".parse::<FillValue>().unwrap(),
            FillValue::Strategy(FillStrategy::ForwardFill)
        );
        assert!("nearest".parse::<FillValue>().is_err());

        let from_json: FillValue = serde_json::from_str("\"ffill\"").unwrap();
        assert_eq!(from_json, FillValue::Strategy(FillStrategy::ForwardFill));
        let from_json: FillValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(from_json, FillValue::Constant(2.5));
    }

    #[test]
    fn test_doane_bins_cover_range() {
        let a = [1.0, 2.0, 3.0, 2.0, 1.0];
        let edges = shared_bins(&a, &a, BinMethod::Doane).unwrap();
        assert_eq!(edges.len(), 6);
        assert_eq!(edges[0], 1.0);
        assert_eq!(edges[5], 3.0);
    }

    #[test]
    fn test_auto_bins_pick_smaller_width() {
        let data: Vec<f64> = (0..10).map(f64::from).collect();
        let edges = shared_bins(&data, &[], BinMethod::Auto).unwrap();
        // Sturges width 9 / (log2(10) + 1) beats Freedman–Diaconis here
        assert_eq!(edges.len() - 1, 5);
    }

    #[test]
    fn test_degenerate_range_single_bin() {
        let edges = shared_bins(&[4.0, 4.0], &[4.0], BinMethod::Doane).unwrap();
        assert_eq!(edges, vec![3.5, 4.5]);
        assert_eq!(histogram(&[4.0, 4.0], &edges), vec![2.0]);
    }

    #[test]
    fn test_shared_bins_rejects_empty_and_non_finite() {
        assert!(matches!(
            shared_bins(&[], &[], BinMethod::Auto),
            Err(MetricError::EmptyInput { .. })
        ));
        assert!(matches!(
            shared_bins(&[1.0, f64::NAN], &[2.0], BinMethod::Auto),
            Err(MetricError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_explicit_bin_count_capped() {
        let err = shared_bins(&[1.0, 2.0], &[3.0], BinMethod::Count(MAX_BINS + 1)).unwrap_err();
        assert!(matches!(err, MetricError::InvalidParameter { name: "bins", .. }));
        assert_eq!(shared_bins(&[1.0], &[3.0], BinMethod::Count(4)).unwrap().len(), 5);
    }

    #[test]
    fn test_histogram_last_bin_closed() {
        let edges = [0.0, 1.0, 2.0];
        assert_eq!(histogram(&[0.0, 0.5, 1.0, 2.0, 2.5], &edges), vec![2.0, 2.0]);
    }

    #[test]
    fn test_bin_method_parsing() {
        assert_eq!("doane".parse::<BinMethod>().unwrap(), BinMethod::Doane);
        assert_eq!("12".parse::<BinMethod>().unwrap(), BinMethod::Count(12));
        assert!("0".parse::<BinMethod>().is_err());
    }

    #[test]
    fn test_normalize_input() {
        let table = daily(&[("d1", 1.0), ("d2", 2.0)]);
        assert_eq!(normalize_input(&table).unwrap(), vec![1.0, 2.0]);
        assert_eq!(
            normalize_input(&MeasurementResult::Sequence(vec![3.0])).unwrap(),
            vec![3.0]
        );
        assert!(matches!(
            normalize_input(&MeasurementResult::Scalar(1.0)),
            Err(MetricError::NonNumeric { .. })
        ));
    }
}
