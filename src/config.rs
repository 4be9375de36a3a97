// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Run configuration.
//!
//! A [`Configuration`] names, per platform and measurement type, which
//! metrics to compute and with which parameters. It is loaded once and read
//! only for the lifetime of a run. [`RunnerConfig`] holds the scheduling
//! knobs of the orchestrator itself.

use crate::error::{Result, SocialSimError};
use crate::metrics::MetricParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Pseudo-platform whose measurements see the whole dataset.
pub const MULTI_PLATFORM: &str = "multi_platform";

/// Default record cap per platform in fast-iteration mode.
pub const DEFAULT_TEST_SUBSET_SIZE: usize = 1000;

/// Settings of one (platform, measurement type) node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Metric identifiers to run against this measurement.
    #[serde(default)]
    pub metrics: BTreeSet<String>,

    /// Per-metric parameters, keyed by metric identifier.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metric_args: BTreeMap<String, MetricParams>,

    /// Everything else; passed through to the measurement collaborator.
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl MeasurementConfig {
    pub fn with_metrics<S: Into<String>>(metrics: impl IntoIterator<Item = S>) -> Self {
        Self {
            metrics: metrics.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Builder-style parameters for one metric.
    pub fn with_metric_args(mut self, metric: impl Into<String>, params: MetricParams) -> Self {
        self.metric_args.insert(metric.into(), params);
        self
    }

    /// Parameters for `metric`, defaulted when not configured.
    pub fn metric_params(&self, metric: &str) -> MetricParams {
        self.metric_args.get(metric).cloned().unwrap_or_default()
    }
}

/// `platform → measurement type → settings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, BTreeMap<String, MeasurementConfig>>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one node.
    pub fn with(
        mut self,
        platform: impl Into<String>,
        measurement_type: impl Into<String>,
        config: MeasurementConfig,
    ) -> Self {
        self.0
            .entry(platform.into())
            .or_default()
            .insert(measurement_type.into(), config);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn platforms(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Measurement types configured for `platform`.
    pub fn measurements(&self, platform: &str) -> Option<&BTreeMap<String, MeasurementConfig>> {
        self.0.get(platform)
    }

    pub fn get(&self, platform: &str, measurement_type: &str) -> Option<&MeasurementConfig> {
        self.0.get(platform)?.get(measurement_type)
    }

    /// All (platform, measurement type, settings) nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &str, &MeasurementConfig)> {
        self.0.iter().flat_map(|(platform, types)| {
            types
                .iter()
                .map(move |(mtype, cfg)| (platform.as_str(), mtype.as_str(), cfg))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scheduling knobs of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Run units on a worker pool instead of one after another.
    pub parallel: bool,

    /// Worker count; rayon's default when unset.
    pub max_threads: Option<usize>,

    /// Per-metric deadline in milliseconds.
    pub metric_timeout_ms: Option<u64>,

    /// Truncate every platform subset to `test_subset_size` records.
    pub fast_iteration: bool,

    pub test_subset_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_threads: None,
            metric_timeout_ms: None,
            fast_iteration: false,
            test_subset_size: DEFAULT_TEST_SUBSET_SIZE,
        }
    }
}

impl RunnerConfig {
    /// Single-threaded, in configuration order.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads == Some(0) {
            return Err(SocialSimError::InvalidConfig(
                "max_threads must be at least 1".to_string(),
            ));
        }
        if self.fast_iteration && self.test_subset_size == 0 {
            return Err(SocialSimError::InvalidConfig(
                "test_subset_size must be at least 1 in fast-iteration mode".to_string(),
            ));
        }
        Ok(())
    }
}
