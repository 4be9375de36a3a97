// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Measurement orchestration and the task runner.
//!
//! [`Orchestrator::measure`] walks the configured (platform, measurement
//! type) grid over one dataset. Subsetting happens per platform; every
//! measurement unit then runs on the worker pool, and any failure is
//! turned into a null result plus a log at that unit's key path.
//!
//! [`TaskRunner`] caches one ground-truth measurement pass and evaluates
//! simulations against it.

use crate::bundle::{
    MeasurementLogs, MeasurementResults, PlatformLogs, TaskLogs, TaskResults,
};
use crate::config::{Configuration, RunnerConfig, MULTI_PLATFORM};
use crate::dataset::Dataset;
use crate::engine::MetricsEngine;
use crate::error::Result;
use crate::execution::{ExecutionLog, LogStatus};
use crate::measurement::{MeasurementContext, MeasurementSuite, RunOptions};
use crate::observer::{LogObserver, RunEvent, RunObserver, Side, SideObserver, Stage};
use crate::pool::{self, WorkerPool};
use crate::result::MeasurementResult;
use std::sync::Arc;
use std::time::Instant;

/// One (platform, measurement type) node ready to run.
struct MeasurementUnit<'a> {
    platform: &'a str,
    measurement_type: &'a str,
    context: MeasurementContext,
}

/// Runs the measurement grid of one dataset.
pub struct Orchestrator {
    pool: Arc<WorkerPool>,
    runner: RunnerConfig,
    observer: Arc<dyn RunObserver>,
}

impl Orchestrator {
    pub fn new(runner: &RunnerConfig) -> Result<Self> {
        Ok(Self {
            pool: Arc::new(WorkerPool::new(runner)?),
            runner: runner.clone(),
            observer: Arc::new(LogObserver),
        })
    }

    /// Replace the event sink.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Metrics engine sharing this orchestrator's pool and sink.
    pub fn metrics_engine(&self) -> MetricsEngine {
        MetricsEngine::with_pool(
            Arc::clone(&self.pool),
            self.runner.metric_timeout_ms,
            Arc::clone(&self.observer),
        )
    }

    /// Produce a result and a log for every configured measurement.
    pub fn measure(
        &self,
        dataset: &Dataset,
        configuration: &Configuration,
        suite: &MeasurementSuite,
        metadata: Option<Arc<serde_json::Value>>,
        options: &RunOptions,
    ) -> (MeasurementResults, MeasurementLogs) {
        self.measure_with(
            dataset,
            configuration,
            suite,
            metadata,
            options,
            self.observer.as_ref(),
        )
    }

    fn measure_with(
        &self,
        dataset: &Dataset,
        configuration: &Configuration,
        suite: &MeasurementSuite,
        metadata: Option<Arc<serde_json::Value>>,
        options: &RunOptions,
        observer: &dyn RunObserver,
    ) -> (MeasurementResults, MeasurementLogs) {
        let mut results = MeasurementResults::new();
        let mut logs = MeasurementLogs::new();
        let mut units = Vec::new();

        for platform in configuration.platforms() {
            let Some(types) = configuration.measurements(platform) else {
                continue;
            };
            let started = Instant::now();
            let subset = self.subset(dataset, platform);

            let subset_log = match &subset {
                Ok(_) => ExecutionLog::success(),
                Err(e) => ExecutionLog::failure(LogStatus::SubsetFailed, e),
            };
            observer.record(
                RunEvent::new(Stage::Subset, platform.as_str(), subset_log.clone())
                    .elapsed_ms(started.elapsed().as_millis() as u64),
            );

            let platform_results = results.entry(platform.clone()).or_default();
            let platform_logs = logs
                .entry(platform.clone())
                .or_insert_with(|| PlatformLogs::new(subset_log));

            match subset {
                Ok(subset) => {
                    let scope = (platform != MULTI_PLATFORM).then(|| platform.clone());
                    for (mtype, cfg) in types {
                        units.push(MeasurementUnit {
                            platform,
                            measurement_type: mtype,
                            context: MeasurementContext {
                                dataset: subset.clone(),
                                platform: scope.clone(),
                                config: cfg.clone(),
                                metadata: metadata.clone(),
                            },
                        });
                    }
                }
                Err(e) => {
                    for mtype in types.keys() {
                        platform_results.insert(mtype.clone(), None);
                        platform_logs.measurements.insert(
                            mtype.clone(),
                            ExecutionLog::failure(
                                LogStatus::SubsetFailed,
                                format!("platform subset unavailable: {}", e),
                            ),
                        );
                    }
                }
            }
        }

        log::debug!(
            "running {} measurement units on {} thread(s)",
            units.len(),
            self.pool.num_threads()
        );

        let outcomes = self.pool.map(units, |unit| {
            let started = Instant::now();
            let (result, log) = run_unit(suite, unit.measurement_type, unit.context, options);
            observer.record(
                RunEvent::new(Stage::Measurement, unit.platform, log.clone())
                    .measurement(unit.measurement_type)
                    .elapsed_ms(started.elapsed().as_millis() as u64),
            );
            (unit.platform, unit.measurement_type, result, log)
        });

        for (platform, mtype, result, log) in outcomes {
            results
                .entry(platform.to_string())
                .or_default()
                .insert(mtype.to_string(), result);
            if let Some(platform_logs) = logs.get_mut(platform) {
                platform_logs.measurements.insert(mtype.to_string(), log);
            }
        }

        (results, logs)
    }

    fn subset(&self, dataset: &Dataset, platform: &str) -> Result<Dataset> {
        let subset = if platform == MULTI_PLATFORM {
            dataset.clone()
        } else {
            dataset.subset(platform)?
        };
        Ok(if self.runner.fast_iteration {
            subset.truncated(self.runner.test_subset_size)
        } else {
            subset
        })
    }
}

/// Resolve, construct and run one collaborator.
fn run_unit(
    suite: &MeasurementSuite,
    measurement_type: &str,
    context: MeasurementContext,
    options: &RunOptions,
) -> (Option<MeasurementResult>, ExecutionLog) {
    let instantiation_failed = |reason: String| {
        (
            None,
            ExecutionLog::failure(
                LogStatus::InstantiationFailed,
                format!("failed to instantiate measurement: {}", reason),
            ),
        )
    };

    let provider = match suite.resolve(measurement_type) {
        Ok(provider) => provider,
        Err(e) => return instantiation_failed(e.to_string()),
    };
    let mut instance = match pool::contain(|| provider.instantiate(context)) {
        Ok(Ok(instance)) => instance,
        Ok(Err(e)) => return instantiation_failed(e.to_string()),
        Err(panic) => return instantiation_failed(panic),
    };

    let reason = match pool::contain(|| instance.run(options)) {
        Ok(Ok(result)) => return (Some(result), ExecutionLog::success()),
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic,
    };
    (
        None,
        ExecutionLog::failure(
            LogStatus::ExecutionFailed,
            format!("measurement failed to run: {}", reason),
        ),
    )
}

/// One-shot [`Orchestrator::measure`] reporting to the `log` facade.
pub fn run_measurements(
    dataset: &Dataset,
    configuration: &Configuration,
    suite: &MeasurementSuite,
    metadata: Option<serde_json::Value>,
    options: &RunOptions,
    runner: &RunnerConfig,
) -> Result<(MeasurementResults, MeasurementLogs)> {
    Ok(Orchestrator::new(runner)?.measure(
        dataset,
        configuration,
        suite,
        metadata.map(Arc::new),
        options,
    ))
}

/// Builder for [`TaskRunner`].
pub struct TaskRunnerBuilder {
    configuration: Configuration,
    suite: MeasurementSuite,
    metadata: Option<Arc<serde_json::Value>>,
    runner: RunnerConfig,
    options: RunOptions,
    observer: Arc<dyn RunObserver>,
}

impl TaskRunnerBuilder {
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(Arc::new(metadata));
        self
    }

    pub fn runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Options for the ground-truth pass.
    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Measure `ground_truth` now and keep the outcome.
    pub fn build(self, ground_truth: &Dataset) -> Result<TaskRunner> {
        let orchestrator =
            Orchestrator::new(&self.runner)?.with_observer(Arc::clone(&self.observer));
        let tagged = SideObserver {
            inner: self.observer.as_ref(),
            side: Side::GroundTruth,
        };
        let (results, logs) = orchestrator.measure_with(
            ground_truth,
            &self.configuration,
            &self.suite,
            self.metadata.clone(),
            &self.options,
            &tagged,
        );
        log::info!(
            "ground truth measured: {} platform(s), {} record(s)",
            results.len(),
            ground_truth.len()
        );
        Ok(self.finish(orchestrator, results, logs))
    }

    /// Use already computed ground-truth results.
    pub fn build_from_results(
        self,
        results: MeasurementResults,
        logs: MeasurementLogs,
    ) -> Result<TaskRunner> {
        let orchestrator =
            Orchestrator::new(&self.runner)?.with_observer(Arc::clone(&self.observer));
        Ok(self.finish(orchestrator, results, logs))
    }

    fn finish(
        self,
        orchestrator: Orchestrator,
        results: MeasurementResults,
        logs: MeasurementLogs,
    ) -> TaskRunner {
        TaskRunner {
            engine: orchestrator.metrics_engine(),
            orchestrator,
            configuration: self.configuration,
            suite: self.suite,
            metadata: self.metadata,
            ground_truth: (results, logs),
        }
    }
}

/// Evaluates simulations against one cached ground truth.
pub struct TaskRunner {
    orchestrator: Orchestrator,
    engine: MetricsEngine,
    configuration: Configuration,
    suite: MeasurementSuite,
    metadata: Option<Arc<serde_json::Value>>,
    ground_truth: (MeasurementResults, MeasurementLogs),
}

impl TaskRunner {
    pub fn builder(configuration: Configuration, suite: MeasurementSuite) -> TaskRunnerBuilder {
        TaskRunnerBuilder {
            configuration,
            suite,
            metadata: None,
            runner: RunnerConfig::default(),
            options: RunOptions::default(),
            observer: Arc::new(LogObserver),
        }
    }

    /// Measure `ground_truth` once with default options.
    pub fn new(
        ground_truth: &Dataset,
        configuration: Configuration,
        suite: MeasurementSuite,
        runner: &RunnerConfig,
    ) -> Result<Self> {
        Self::builder(configuration, suite)
            .runner(runner.clone())
            .build(ground_truth)
    }

    pub fn from_results(
        results: MeasurementResults,
        logs: MeasurementLogs,
        configuration: Configuration,
        suite: MeasurementSuite,
        runner: &RunnerConfig,
    ) -> Result<Self> {
        Self::builder(configuration, suite)
            .runner(runner.clone())
            .build_from_results(results, logs)
    }

    /// Cached ground-truth results and logs.
    pub fn ground_truth(&self) -> (&MeasurementResults, &MeasurementLogs) {
        (&self.ground_truth.0, &self.ground_truth.1)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Measure `simulation` and score it against the ground truth.
    pub fn run(&self, simulation: &Dataset, options: &RunOptions) -> (TaskResults, TaskLogs) {
        let tagged = SideObserver {
            inner: self.orchestrator.observer.as_ref(),
            side: Side::Simulation,
        };
        let (simulation_results, simulation_logs) = self.orchestrator.measure_with(
            simulation,
            &self.configuration,
            &self.suite,
            self.metadata.clone(),
            options,
            &tagged,
        );
        let (metrics, metrics_logs) =
            self.engine
                .run(&self.ground_truth.0, &simulation_results, &self.configuration);

        (
            TaskResults {
                simulation_results,
                ground_truth_results: self.ground_truth.0.clone(),
                metrics,
            },
            TaskLogs {
                simulation_logs,
                ground_truth_logs: self.ground_truth.1.clone(),
                metrics_logs,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{measurement, measurement_log, metric_value};
    use crate::config::MeasurementConfig;
    use crate::dataset::Record;
    use crate::error::MeasurementError;
    use crate::measurement::{from_fn, Measurement, MeasurementType};
    use crate::observer::MemoryObserver;

    fn measurement_config(metrics: &[&str]) -> MeasurementConfig {
        MeasurementConfig::with_metrics(metrics.iter().copied())
    }

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Record::new("twitter"),
            Record::new("twitter"),
            Record::new("github"),
        ])
    }

    fn counting_suite() -> MeasurementSuite {
        MeasurementSuite::new().with(
            MeasurementType::SocialActivity,
            from_fn(|ctx, _| Ok(MeasurementResult::Scalar(ctx.dataset.len() as f64))),
        )
    }

    fn config(platforms: &[&str], mtype: &str) -> Configuration {
        platforms.iter().fold(Configuration::new(), |c, p| {
            c.with(*p, mtype, measurement_config(&["absolute_difference"]))
        })
    }

    #[test]
    fn test_subsets_per_platform() {
        let (results, logs) = run_measurements(
            &dataset(),
            &config(&["twitter", "github", MULTI_PLATFORM], "social_activity"),
            &counting_suite(),
            None,
            &RunOptions::default(),
            &RunnerConfig::default(),
        )
        .unwrap();

        let count = |p: &str| measurement(&results, p, "social_activity").and_then(|r| r.as_scalar());
        assert_eq!(count("twitter"), Some(2.0));
        assert_eq!(count("github"), Some(1.0));
        assert_eq!(count(MULTI_PLATFORM), Some(3.0));
        assert!(logs.values().all(|p| p.subset.is_success()));
    }

    #[test]
    fn test_multi_platform_omits_platform() {
        let suite = MeasurementSuite::new().with(
            MeasurementType::MultiPlatform,
            from_fn(|ctx, _| {
                assert!(ctx.platform.is_none());
                Ok(MeasurementResult::Scalar(1.0))
            }),
        );
        let (results, _) = run_measurements(
            &dataset(),
            &config(&[MULTI_PLATFORM], "multi_platform"),
            &suite,
            None,
            &RunOptions::default(),
            &RunnerConfig::sequential(),
        )
        .unwrap();
        assert!(measurement(&results, MULTI_PLATFORM, "multi_platform").is_some());
    }

    #[test]
    fn test_fast_iteration_truncates() {
        let runner = RunnerConfig {
            fast_iteration: true,
            test_subset_size: 1,
            ..RunnerConfig::default()
        };
        let (results, _) = run_measurements(
            &dataset(),
            &config(&["twitter"], "social_activity"),
            &counting_suite(),
            None,
            &RunOptions::default(),
            &runner,
        )
        .unwrap();
        assert_eq!(
            measurement(&results, "twitter", "social_activity"),
            Some(&MeasurementResult::Scalar(1.0))
        );
    }

    #[test]
    fn test_subset_failure_is_logged_per_measurement() {
        let no_platforms: Dataset = serde_json::from_str(r#"[{"id": 1}]"#).unwrap();
        let observer = Arc::new(MemoryObserver::new());
        let orchestrator = Orchestrator::new(&RunnerConfig::default())
            .unwrap()
            .with_observer(observer.clone());
        let (results, logs) = orchestrator.measure(
            &no_platforms,
            &config(&["twitter"], "social_activity"),
            &counting_suite(),
            None,
            &RunOptions::default(),
        );

        assert_eq!(results["twitter"]["social_activity"], None);
        assert_eq!(logs["twitter"].subset.status, LogStatus::SubsetFailed);
        assert_eq!(
            measurement_log(&logs, "twitter", "social_activity").unwrap().status,
            LogStatus::SubsetFailed
        );
        assert_eq!(observer.events_by_stage(Stage::Subset).len(), 1);
        assert_eq!(observer.events_by_stage(Stage::Measurement).len(), 0);
    }

    #[test]
    fn test_failure_phases() {
        let suite = MeasurementSuite::new()
            .with(
                MeasurementType::SocialStructure,
                |_: MeasurementContext| -> std::result::Result<Box<dyn Measurement>, MeasurementError> {
                    Err(MeasurementError::Instantiation("no graph".into()))
                },
            )
            .with(
                MeasurementType::Recurrence,
                from_fn(|_, _| Err(MeasurementError::Execution("bad window".into()))),
            )
            .with(
                MeasurementType::InformationCascades,
                from_fn(|_, _| panic!("cascade index out of range")),
            );
        let configuration = Configuration::new()
            .with("github", "social_structure", measurement_config(&[]))
            .with("github", "recurrence", measurement_config(&[]))
            .with("github", "information_cascades", measurement_config(&[]))
            .with("github", "persistent_groups", measurement_config(&[]))
            .with("github", "social_graph", measurement_config(&[]));

        let (results, logs) = run_measurements(
            &dataset(),
            &configuration,
            &suite,
            None,
            &RunOptions::default(),
            &RunnerConfig::default(),
        )
        .unwrap();

        let status = |m: &str| measurement_log(&logs, "github", m).unwrap().status;
        assert_eq!(status("social_structure"), LogStatus::InstantiationFailed);
        assert_eq!(status("recurrence"), LogStatus::ExecutionFailed);
        assert_eq!(status("information_cascades"), LogStatus::ExecutionFailed);
        assert_eq!(status("persistent_groups"), LogStatus::InstantiationFailed);
        assert_eq!(status("social_graph"), LogStatus::InstantiationFailed);
        assert!(results["github"].values().all(Option::is_none));

        let panic_log = measurement_log(&logs, "github", "information_cascades").unwrap();
        assert!(panic_log
            .error
            .as_deref()
            .unwrap()
            .contains("cascade index out of range"));
    }

    #[test]
    fn test_task_runner_caches_ground_truth() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let suite = MeasurementSuite::new().with(
            MeasurementType::SocialActivity,
            from_fn(move |ctx, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MeasurementResult::Scalar(ctx.dataset.len() as f64))
            }),
        );
        let observer = Arc::new(MemoryObserver::new());
        let runner = TaskRunner::builder(config(&["twitter"], "social_activity"), suite)
            .observer(observer.clone())
            .build(&dataset())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let simulation = Dataset::new(vec![Record::new("twitter")]);
        for _ in 0..3 {
            let (results, logs) = runner.run(&simulation, &RunOptions::default());
            assert_eq!(
                metric_value(
                    &results.metrics,
                    "twitter",
                    "social_activity",
                    "absolute_difference"
                ),
                Some(1.0)
            );
            assert!(logs.metrics_logs["twitter"]["social_activity"]["absolute_difference"].is_success());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let sides: Vec<_> = observer
            .events_by_stage(Stage::Measurement)
            .into_iter()
            .map(|e| e.side)
            .collect();
        assert_eq!(sides[0], Some(Side::GroundTruth));
        assert!(sides[1..].iter().all(|s| *s == Some(Side::Simulation)));
    }

    #[test]
    fn test_from_results_skips_measuring() {
        let (gt_results, gt_logs) = run_measurements(
            &dataset(),
            &config(&["github"], "social_activity"),
            &counting_suite(),
            None,
            &RunOptions::default(),
            &RunnerConfig::default(),
        )
        .unwrap();
        let runner = TaskRunner::from_results(
            gt_results.clone(),
            gt_logs,
            config(&["github"], "social_activity"),
            counting_suite(),
            &RunnerConfig::sequential(),
        )
        .unwrap();
        assert_eq!(runner.ground_truth().0, &gt_results);

        let (results, _) = runner.run(&Dataset::default(), &RunOptions::default());
        assert_eq!(
            metric_value(
                &results.metrics,
                "github",
                "social_activity",
                "absolute_difference"
            ),
            Some(1.0)
        );
    }
}
