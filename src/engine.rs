// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Metrics engine.
//!
//! Pairs ground-truth and simulation measurement results by key path and
//! runs every configured metric on each pair. Each (platform, measurement
//! type, metric) call is an independent unit: it runs on the worker pool
//! and whatever goes wrong inside it ends up as a null value and a log at
//! its own key path.

use crate::bundle::{self, MeasurementResults, MetricLogs, MetricResults};
use crate::cancel::CancelToken;
use crate::config::{Configuration, RunnerConfig};
use crate::error::Result;
use crate::execution::{ExecutionLog, LogStatus};
use crate::metrics::{self, MetricParams, MetricValue};
use crate::observer::{LogObserver, RunEvent, RunObserver, Stage};
use crate::pool::{self, WorkerPool};
use crate::result::MeasurementResult;
use std::sync::Arc;
use std::time::Instant;

/// One metric call to make.
struct MetricUnit<'a> {
    platform: &'a str,
    measurement_type: &'a str,
    metric: &'a str,
    params: MetricParams,
    ground_truth: Option<&'a MeasurementResult>,
    simulation: Option<&'a MeasurementResult>,
}

/// Runs metric units and assembles their results.
pub struct MetricsEngine {
    pool: Arc<WorkerPool>,
    metric_timeout_ms: Option<u64>,
    observer: Arc<dyn RunObserver>,
}

impl MetricsEngine {
    /// Engine with its own pool, reporting to the `log` facade.
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        Ok(Self::with_pool(
            Arc::new(WorkerPool::new(config)?),
            config.metric_timeout_ms,
            Arc::new(LogObserver),
        ))
    }

    pub(crate) fn with_pool(
        pool: Arc<WorkerPool>,
        metric_timeout_ms: Option<u64>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            pool,
            metric_timeout_ms,
            observer,
        }
    }

    /// Replace the event sink.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Compute every configured metric.
    ///
    /// The output mirrors `configuration`: each configured measurement gets
    /// a map with one value and one log per configured metric.
    pub fn run(
        &self,
        ground_truth: &MeasurementResults,
        simulation: &MeasurementResults,
        configuration: &Configuration,
    ) -> (MetricResults, MetricLogs) {
        let mut values = MetricResults::new();
        let mut logs = MetricLogs::new();
        let mut units = Vec::new();

        for (platform, mtype, cfg) in configuration.nodes() {
            values
                .entry(platform.to_string())
                .or_default()
                .entry(mtype.to_string())
                .or_default();
            logs.entry(platform.to_string())
                .or_default()
                .entry(mtype.to_string())
                .or_default();

            let gt = bundle::measurement(ground_truth, platform, mtype);
            let sim = bundle::measurement(simulation, platform, mtype);
            for metric in &cfg.metrics {
                units.push(MetricUnit {
                    platform,
                    measurement_type: mtype,
                    metric,
                    params: cfg.metric_params(metric),
                    ground_truth: gt,
                    simulation: sim,
                });
            }
        }

        log::debug!(
            "running {} metric units on {} thread(s)",
            units.len(),
            self.pool.num_threads()
        );

        let outcomes = self.pool.map(units, |unit| {
            let (value, log) = self.run_unit(&unit);
            (unit.platform, unit.measurement_type, unit.metric, value, log)
        });

        for (platform, mtype, metric, value, log) in outcomes {
            values
                .entry(platform.to_string())
                .or_default()
                .entry(mtype.to_string())
                .or_default()
                .insert(metric.to_string(), value);
            logs.entry(platform.to_string())
                .or_default()
                .entry(mtype.to_string())
                .or_default()
                .insert(metric.to_string(), log);
        }

        (values, logs)
    }

    fn run_unit(&self, unit: &MetricUnit<'_>) -> (MetricValue, ExecutionLog) {
        let started = Instant::now();
        let (value, log) = match (unit.ground_truth, unit.simulation) {
            (Some(gt), Some(sim)) => self.compute(unit, gt, sim),
            (gt, _) => {
                let missing = if gt.is_none() {
                    "ground truth"
                } else {
                    "simulation"
                };
                (
                    None,
                    ExecutionLog::failure(
                        LogStatus::Unavailable,
                        format!("no {} measurement result", missing),
                    ),
                )
            }
        };

        self.observer.record(
            RunEvent::new(Stage::Metric, unit.platform, log.clone())
                .measurement(unit.measurement_type)
                .metric(unit.metric)
                .elapsed_ms(started.elapsed().as_millis() as u64),
        );
        (value, log)
    }

    fn compute(
        &self,
        unit: &MetricUnit<'_>,
        gt: &MeasurementResult,
        sim: &MeasurementResult,
    ) -> (MetricValue, ExecutionLog) {
        let cancel = CancelToken::from_millis(self.metric_timeout_ms);
        let outcome =
            pool::contain(|| metrics::compute_named(unit.metric, gt, sim, &unit.params, &cancel));

        match outcome {
            Ok(Ok(_)) if cancel.is_cancelled() => (
                None,
                ExecutionLog::failure(
                    LogStatus::TimedOut,
                    format!(
                        "finished after the {}ms deadline",
                        self.metric_timeout_ms.unwrap_or_default()
                    ),
                ),
            ),
            Ok(Ok(v)) if v.is_nan() => (
                None,
                ExecutionLog::failure(LogStatus::NotComputable, "metric evaluated to NaN"),
            ),
            Ok(Ok(v)) => (Some(v), ExecutionLog::success()),
            Ok(Err(e)) => (None, ExecutionLog::from_metric_error(&e)),
            Err(panic) => (None, ExecutionLog::failure(LogStatus::MetricFailed, panic)),
        }
    }
}

/// One-shot [`MetricsEngine::run`] with a fresh engine.
pub fn run_metrics(
    ground_truth: &MeasurementResults,
    simulation: &MeasurementResults,
    configuration: &Configuration,
    runner: &RunnerConfig,
) -> Result<(MetricResults, MetricLogs)> {
    Ok(MetricsEngine::new(runner)?.run(ground_truth, simulation, configuration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{metric_log, metric_value};
    use crate::config::MeasurementConfig;
    use crate::observer::MemoryObserver;
    use crate::result::Table;

    fn results(entries: &[(&str, &str, Option<MeasurementResult>)]) -> MeasurementResults {
        let mut out = MeasurementResults::new();
        for (platform, mtype, result) in entries {
            out.entry(platform.to_string())
                .or_default()
                .insert(mtype.to_string(), result.clone());
        }
        out
    }

    fn series(values: &[f64]) -> MeasurementResult {
        Table::series("day", values.iter().enumerate().map(|(i, &v)| (i as i64, v)))
            .unwrap()
            .into()
    }

    fn engine(observer: Arc<MemoryObserver>) -> MetricsEngine {
        MetricsEngine::new(&RunnerConfig::default())
            .unwrap()
            .with_observer(observer)
    }

    #[test]
    fn test_identical_series_metrics() {
        let x = series(&[1.0, 2.0, 3.0, 2.0, 1.0]);
        let gt = results(&[("twitter", "social_activity", Some(x.clone()))]);
        let sim = gt.clone();
        let config = Configuration::new().with(
            "twitter",
            "social_activity",
            MeasurementConfig::with_metrics(["rmse", "r2", "pearson", "ks_test"]),
        );

        let (values, logs) = engine(Arc::new(MemoryObserver::new())).run(&gt, &sim, &config);
        let value = |m: &str| metric_value(&values, "twitter", "social_activity", m).unwrap();
        assert_eq!(value("rmse"), 0.0);
        assert!((value("r2") - 1.0).abs() < 1e-12);
        assert!((value("pearson") - 1.0).abs() < 1e-12);
        assert_eq!(value("ks_test"), 0.0);
        for metric in ["rmse", "r2", "pearson", "ks_test"] {
            assert!(metric_log(&logs, "twitter", "social_activity", metric)
                .unwrap()
                .is_success());
        }
    }

    #[test]
    fn test_failures_stay_local() {
        let gt = results(&[
            ("twitter", "social_activity", Some(MeasurementResult::Scalar(0.0))),
            ("twitter", "social_structure", None),
        ]);
        let sim = results(&[
            ("twitter", "social_activity", Some(MeasurementResult::Scalar(4.0))),
            ("twitter", "social_structure", Some(MeasurementResult::Scalar(1.0))),
        ]);
        let config = Configuration::new()
            .with(
                "twitter",
                "social_activity",
                MeasurementConfig::with_metrics([
                    "absolute_difference",
                    "absolute_percentage_error",
                    "no_such_metric",
                ]),
            )
            .with(
                "twitter",
                "social_structure",
                MeasurementConfig::with_metrics(["absolute_difference"]),
            );

        let observer = Arc::new(MemoryObserver::new());
        let (values, logs) = engine(observer.clone()).run(&gt, &sim, &config);
        let status = |mtype: &str, metric: &str| {
            metric_log(&logs, "twitter", mtype, metric).unwrap().status
        };

        assert_eq!(
            metric_value(&values, "twitter", "social_activity", "absolute_difference"),
            Some(4.0)
        );
        assert_eq!(
            status("social_activity", "absolute_percentage_error"),
            LogStatus::NotComputable
        );
        assert_eq!(status("social_activity", "no_such_metric"), LogStatus::MetricFailed);
        assert_eq!(
            status("social_structure", "absolute_difference"),
            LogStatus::Unavailable
        );
        assert_eq!(observer.len(), 4);
    }

    #[test]
    fn test_every_value_has_a_log() {
        let gt = results(&[("github", "recurrence", Some(series(&[1.0, 5.0])))]);
        let sim = results(&[("github", "recurrence", Some(series(&[2.0])))]);
        let config = Configuration::new().with(
            "github",
            "recurrence",
            MeasurementConfig::with_metrics(["rmse", "r2", "dtw", "js_divergence"]),
        );
        let (values, logs) = engine(Arc::new(MemoryObserver::new())).run(&gt, &sim, &config);

        let metric_values = &values["github"]["recurrence"];
        let metric_logs = &logs["github"]["recurrence"];
        assert_eq!(metric_values.len(), 4);
        for (metric, value) in metric_values {
            let log = &metric_logs[metric];
            assert_eq!(value.is_none(), !log.is_success(), "{}", metric);
        }
    }

    #[test]
    fn test_timeout_nulls_result() {
        let long: Vec<f64> = (0..3000).map(|i| (i % 17) as f64).collect();
        let gt = results(&[("reddit", "social_activity", Some(long.clone().into()))]);
        let sim = results(&[("reddit", "social_activity", Some(long.into()))]);
        let config = Configuration::new().with(
            "reddit",
            "social_activity",
            MeasurementConfig::with_metrics(["dtw", "absolute_difference"]),
        );
        let runner = RunnerConfig {
            metric_timeout_ms: Some(0),
            ..RunnerConfig::default()
        };

        let (values, logs) = run_metrics(&gt, &sim, &config, &runner).unwrap();
        assert_eq!(metric_value(&values, "reddit", "social_activity", "dtw"), None);
        assert_eq!(
            metric_log(&logs, "reddit", "social_activity", "dtw").unwrap().status,
            LogStatus::TimedOut
        );
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let gt = results(&[("twitter", "social_activity", Some(series(&[1.0, 4.0, 2.0])))]);
        let sim = results(&[("twitter", "social_activity", Some(series(&[2.0, 3.0, 2.0])))]);
        let config = Configuration::new().with(
            "twitter",
            "social_activity",
            MeasurementConfig::with_metrics(["rmse", "pearson", "fast_dtw", "kl_divergence"]),
        );

        let parallel = run_metrics(&gt, &sim, &config, &RunnerConfig::default()).unwrap();
        let sequential = run_metrics(&gt, &sim, &config, &RunnerConfig::sequential()).unwrap();
        assert_eq!(parallel, sequential);
    }
}
