// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Metric library.
//!
//! Every metric is a pure function of a ground-truth result, a simulation
//! result and a [`MetricParams`] bag:
//!
//! - **divergence**: KL (plain and smoothed) and Jensen–Shannon over shared
//!   histograms or category counts
//! - **distance**: scalar differences, RMSE, R², Pearson, two-sample KS
//! - **dtw**: exact and multi-resolution dynamic time warping
//! - **rank**: rank-biased overlap, flat and grouped
//!
//! Metrics return `Err` both for undefined inputs and for real failures;
//! [`MetricError::is_not_computable`] tells the two apart.

pub mod distance;
pub mod divergence;
pub mod dtw;
pub mod rank;

use crate::alignment::{BinMethod, FillValue, JoinKind};
use crate::cancel::CancelToken;
use crate::error::MetricError;
use crate::result::MeasurementResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use rank::{rbo, rbo_weight};

/// Smoothing weight of the uniform component in smoothed KL.
pub const DEFAULT_ALPHA: f64 = 0.01;
/// Logarithm base of JS divergence.
pub const DEFAULT_BASE: f64 = 2.0;
/// RBO persistence.
pub const DEFAULT_P: f64 = 0.95;
/// FastDTW search radius.
pub const DEFAULT_RADIUS: usize = 1;

/// Computed metric value; `None` means not computable.
pub type MetricValue = Option<f64>;

/// Raw outcome of a metric call.
pub type MetricOutcome = Result<f64, MetricError>;

/// Closed set of metric identifiers accepted in configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    AbsoluteDifference,
    AbsolutePercentageError,
    KlDivergence,
    KlDivergenceSmoothed,
    JsDivergence,
    Dtw,
    FastDtw,
    Rmse,
    R2,
    Pearson,
    KsTest,
    RboScore,
    /// Grouped RBO over ranked groups.
    RboForTe,
}

impl MetricKind {
    pub const ALL: [MetricKind; 13] = [
        MetricKind::AbsoluteDifference,
        MetricKind::AbsolutePercentageError,
        MetricKind::KlDivergence,
        MetricKind::KlDivergenceSmoothed,
        MetricKind::JsDivergence,
        MetricKind::Dtw,
        MetricKind::FastDtw,
        MetricKind::Rmse,
        MetricKind::R2,
        MetricKind::Pearson,
        MetricKind::KsTest,
        MetricKind::RboScore,
        MetricKind::RboForTe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::AbsoluteDifference => "absolute_difference",
            MetricKind::AbsolutePercentageError => "absolute_percentage_error",
            MetricKind::KlDivergence => "kl_divergence",
            MetricKind::KlDivergenceSmoothed => "kl_divergence_smoothed",
            MetricKind::JsDivergence => "js_divergence",
            MetricKind::Dtw => "dtw",
            MetricKind::FastDtw => "fast_dtw",
            MetricKind::Rmse => "rmse",
            MetricKind::R2 => "r2",
            MetricKind::Pearson => "pearson",
            MetricKind::KsTest => "ks_test",
            MetricKind::RboScore => "rbo_score",
            MetricKind::RboForTe => "rbo_for_te",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| MetricError::UnknownMetric(s.to_string()))
    }
}

/// Optional per-metric parameters; each metric applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<FillValue>,
    /// RMSE divided by the ground-truth IQR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<bool>,
    /// Category counts instead of numeric samples (KL/JS).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
    /// RBO persistence in (0, 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
    /// Ranked-groups selector for grouped RBO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<BinMethod>,
}

impl MetricParams {
    fn join(&self) -> JoinKind {
        self.join.unwrap_or_default()
    }

    fn fill(&self) -> FillValue {
        self.fill_value.unwrap_or_default()
    }

    fn discrete(&self) -> bool {
        self.discrete.unwrap_or(false)
    }

    fn bins(&self) -> BinMethod {
        self.bins.unwrap_or(BinMethod::Doane)
    }
}

/// Run one metric.
///
/// `cancel` is polled by the DTW family; other metrics are checked once on
/// entry.
pub fn compute(
    kind: MetricKind,
    ground_truth: &MeasurementResult,
    simulation: &MeasurementResult,
    params: &MetricParams,
    cancel: &CancelToken,
) -> MetricOutcome {
    cancel.check()?;
    let (gt, sim) = (ground_truth, simulation);

    match kind {
        MetricKind::AbsoluteDifference => distance::absolute_difference(gt, sim),
        MetricKind::AbsolutePercentageError => distance::absolute_percentage_error(gt, sim),
        MetricKind::KlDivergence => {
            divergence::kl_divergence(gt, sim, params.discrete(), params.bins(), params.base)
        }
        MetricKind::KlDivergenceSmoothed => divergence::kl_divergence_smoothed(
            gt,
            sim,
            params.alpha.unwrap_or(DEFAULT_ALPHA),
            params.discrete(),
            params.bins(),
        ),
        MetricKind::JsDivergence => divergence::js_divergence(
            gt,
            sim,
            params.discrete(),
            params.base.unwrap_or(DEFAULT_BASE),
            params.bins(),
        ),
        MetricKind::Dtw => dtw::dtw(gt, sim, cancel),
        MetricKind::FastDtw => {
            dtw::fast_dtw(gt, sim, params.radius.unwrap_or(DEFAULT_RADIUS), cancel)
        }
        MetricKind::Rmse => distance::rmse(
            gt,
            sim,
            params.join(),
            params.fill(),
            params.relative.unwrap_or(false),
        ),
        MetricKind::R2 => distance::r2(gt, sim, params.join(), params.fill()),
        MetricKind::Pearson => distance::pearson(gt, sim, params.join(), params.fill()),
        MetricKind::KsTest => distance::ks_test(gt, sim),
        MetricKind::RboScore => rank::rbo_score(gt, sim, params.p.unwrap_or(DEFAULT_P)),
        MetricKind::RboForTe => rank::rbo_for_te(
            gt,
            sim,
            params.selector.as_deref(),
            params.p.unwrap_or(DEFAULT_P),
            params.min_count.unwrap_or(0),
        ),
    }
}

/// [`compute`] by configuration identifier.
pub fn compute_named(
    name: &str,
    ground_truth: &MeasurementResult,
    simulation: &MeasurementResult,
    params: &MetricParams,
    cancel: &CancelToken,
) -> MetricOutcome {
    compute(name.parse()?, ground_truth, simulation, params, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_names_roundtrip() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_metric() {
        assert_eq!(
            "nope".parse::<MetricKind>(),
            Err(MetricError::UnknownMetric("nope".to_string()))
        );
    }

    #[test]
    fn test_params_from_json() {
        let params: MetricParams = serde_json::from_str(
            r#"{"join": "outer", "fill_value": "ffill", "p": 0.9, "bins": "sturges"}"#,
        )
        .unwrap();
        assert_eq!(params.join(), JoinKind::Outer);
        assert_eq!(params.bins(), BinMethod::Sturges);
        assert_eq!(params.p, Some(0.9));
        assert!(params.alpha.is_none());
    }

    #[test]
    fn test_compute_dispatch() {
        let gt = MeasurementResult::Scalar(10.0);
        let sim = MeasurementResult::Scalar(12.0);
        let cancel = CancelToken::never();
        let params = MetricParams::default();

        assert_eq!(
            compute(MetricKind::AbsoluteDifference, &gt, &sim, &params, &cancel),
            Ok(2.0)
        );
        assert_eq!(
            compute_named("absolute_percentage_error", &gt, &sim, &params, &cancel),
            Ok(20.0)
        );
    }

    #[test]
    fn test_compute_honours_cancellation() {
        let cancel = CancelToken::never();
        cancel.cancel();
        let x = MeasurementResult::Scalar(1.0);
        let outcome = compute(
            MetricKind::AbsoluteDifference,
            &x,
            &x,
            &MetricParams::default(),
            &cancel,
        );
        assert!(matches!(outcome, Err(MetricError::Cancelled { .. })));
    }
}
