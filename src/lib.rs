// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! # SocialSim - Simulation evaluation metrics
//!
//! Scores simulated social-platform activity against observed ground truth.
//!
//! ## Key Features
//!
//! - **Metric library**: distributional (KL, JS), rank (RBO), alignment
//!   (DTW, FastDTW) and fit (RMSE, R², Pearson, KS) comparisons of two
//!   measurement results
//! - **Fault isolation**: every subset, measurement and metric is its own
//!   unit; a failure becomes a null result plus a log at that key path
//! - **Worker pool**: units run on a rayon pool, with an optional per-metric
//!   deadline
//! - **Observers**: progress goes to an injectable sink, never to stdout
//!
//! ## Quick Start
//!
//! ```rust
//! use socialsim::{
//!     from_fn, Configuration, Dataset, MeasurementConfig, MeasurementResult,
//!     MeasurementSuite, MeasurementType, Record, RunOptions, RunnerConfig, TaskRunner,
//! };
//!
//! // Count events per platform
//! let suite = MeasurementSuite::new().with(
//!     MeasurementType::SocialActivity,
//!     from_fn(|ctx, _| Ok(MeasurementResult::Scalar(ctx.dataset.len() as f64))),
//! );
//! let config = Configuration::new().with(
//!     "twitter",
//!     "social_activity",
//!     MeasurementConfig::with_metrics(["absolute_difference"]),
//! );
//!
//! let observed = Dataset::new(vec![Record::new("twitter"), Record::new("twitter")]);
//! let runner = TaskRunner::new(&observed, config, suite, &RunnerConfig::default()).unwrap();
//!
//! let simulated = Dataset::new(vec![Record::new("twitter")]);
//! let (results, logs) = runner.run(&simulated, &RunOptions::default());
//!
//! assert_eq!(
//!     results.metrics["twitter"]["social_activity"]["absolute_difference"],
//!     Some(1.0)
//! );
//! assert!(logs.metrics_logs["twitter"]["social_activity"]["absolute_difference"].is_success());
//! ```
//!
//! ## Modules
//!
//! - [`result`]: measurement results (scalar, sequence, table, ranked groups)
//! - [`alignment`]: table joins, fill policies and shared histogram bins
//! - [`metrics`]: the metric library
//! - [`measurement`]: measurement types and collaborator traits
//! - [`runner`]: measurement orchestration and [`TaskRunner`]
//! - [`engine`]: the metrics engine
//! - [`observer`]: run event sinks

pub mod alignment;
pub mod bundle;
pub mod cancel;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod execution;
pub mod measurement;
pub mod metrics;
pub mod observer;
pub mod pool;
pub mod result;
pub mod runner;
pub mod stats;

// Re-exports for convenient access
pub use alignment::{join, normalize_input, BinMethod, FillStrategy, FillValue, JoinKind};
pub use bundle::{
    MeasurementLogs, MeasurementResults, MetricLogs, MetricResults, PlatformLogs, TaskLogs,
    TaskResults,
};
pub use cancel::CancelToken;
pub use config::{Configuration, MeasurementConfig, RunnerConfig, MULTI_PLATFORM};
pub use dataset::{Dataset, Record};
pub use engine::{run_metrics, MetricsEngine};
pub use error::{DatasetError, MeasurementError, MetricError, Result, SocialSimError, TableError};
pub use execution::{ExecutionLog, LogStatus};
pub use measurement::{
    from_fn, Measurement, MeasurementContext, MeasurementProvider, MeasurementSuite,
    MeasurementType, RunOptions, SaveFormat,
};
pub use metrics::{compute, compute_named, rbo, rbo_weight, MetricKind, MetricParams, MetricValue};
pub use observer::{LogObserver, MemoryObserver, NullObserver, RunEvent, RunObserver, Side, Stage};
pub use result::{Entity, Key, MeasurementResult, RankedEntry, RankedGroups, Row, Table};
pub use runner::{run_measurements, Orchestrator, TaskRunner, TaskRunnerBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_metric_roundtrip_through_reexports() {
        let x: MeasurementResult = vec![1.0, 2.0, 3.0, 2.0, 1.0].into();
        let value = compute(
            MetricKind::KsTest,
            &x,
            &x,
            &MetricParams::default(),
            &CancelToken::never(),
        )
        .unwrap();
        assert_eq!(value, 0.0);
    }
}
