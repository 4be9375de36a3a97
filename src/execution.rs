// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Per-unit execution logs.
//!
//! Every node of a result bundle has a sibling [`ExecutionLog`] at the same
//! key path. A null result always comes with a non-success log saying why.

use crate::error::MetricError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    /// Metric undefined on this input (zero denominator, empty overlap, ...).
    NotComputable,
    /// Metric skipped because one side's measurement is missing.
    Unavailable,
    SubsetFailed,
    InstantiationFailed,
    ExecutionFailed,
    MetricFailed,
    TimedOut,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::NotComputable => "not_computable",
            LogStatus::Unavailable => "unavailable",
            LogStatus::SubsetFailed => "subset_failed",
            LogStatus::InstantiationFailed => "instantiation_failed",
            LogStatus::ExecutionFailed => "execution_failed",
            LogStatus::MetricFailed => "metric_failed",
            LogStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == LogStatus::Success
    }

    /// True failures, as opposed to success and expected nulls.
    pub fn is_failure(&self) -> bool {
        !matches!(self, LogStatus::Success | LogStatus::NotComputable)
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the captured failure description, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionLog {
    pub fn success() -> Self {
        Self {
            status: LogStatus::Success,
            error: None,
        }
    }

    pub fn failure(status: LogStatus, error: impl fmt::Display) -> Self {
        Self {
            status,
            error: Some(error.to_string()),
        }
    }

    /// Log for a metric that returned an error.
    pub fn from_metric_error(err: &MetricError) -> Self {
        let status = match err {
            MetricError::Cancelled { .. } => LogStatus::TimedOut,
            e if e.is_not_computable() => LogStatus::NotComputable,
            _ => LogStatus::MetricFailed,
        };
        Self::failure(status, err)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Display for ExecutionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(e) => write!(f, "{}: {}", self.status, e),
            None => write!(f, "{}", self.status),
        }
    }
}
