// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Nested result and log collections.
//!
//! All collections are keyed by platform, then measurement type, then (for
//! metrics) metric name. A null result at a key path always has a
//! non-success log at the same path.

use crate::execution::ExecutionLog;
use crate::metrics::MetricValue;
use crate::result::MeasurementResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `platform → measurement type → result` (`None` when the unit failed).
pub type MeasurementResults = BTreeMap<String, BTreeMap<String, Option<MeasurementResult>>>;

/// `platform → measurement type → metric → value`.
pub type MetricResults = BTreeMap<String, BTreeMap<String, BTreeMap<String, MetricValue>>>;

/// `platform → measurement type → metric → log`.
pub type MetricLogs = BTreeMap<String, BTreeMap<String, BTreeMap<String, ExecutionLog>>>;

/// Logs of one platform: the subsetting step and each measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformLogs {
    pub subset: ExecutionLog,
    pub measurements: BTreeMap<String, ExecutionLog>,
}

impl PlatformLogs {
    pub fn new(subset: ExecutionLog) -> Self {
        Self {
            subset,
            measurements: BTreeMap::new(),
        }
    }
}

/// `platform → logs`.
pub type MeasurementLogs = BTreeMap<String, PlatformLogs>;

/// Everything one task invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResults {
    pub simulation_results: MeasurementResults,
    pub ground_truth_results: MeasurementResults,
    #[serde(with = "metric_json")]
    pub metrics: MetricResults,
}

/// Serde adapter for [`MetricResults`].
///
/// JSON has no infinities, so `±∞` is written as the strings `"inf"` and
/// `"-inf"`; `null` stays reserved for metrics that produced no value.
pub mod metric_json {
    use super::MetricResults;
    use crate::metrics::MetricValue;
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    struct Value(MetricValue);

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self.0 {
                Some(v) if v == f64::INFINITY => serializer.serialize_str("inf"),
                Some(v) if v == f64::NEG_INFINITY => serializer.serialize_str("-inf"),
                Some(v) if v.is_finite() => serializer.serialize_f64(v),
                _ => serializer.serialize_none(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let value = match Option::<Repr>::deserialize(deserializer)? {
                None => None,
                Some(Repr::Number(v)) => Some(v),
                Some(Repr::Text(text)) => match text.as_str() {
                    "inf" => Some(f64::INFINITY),
                    "-inf" => Some(f64::NEG_INFINITY),
                    other => {
                        return Err(de::Error::custom(format!(
                            "expected a number, null, \"inf\" or \"-inf\", got {:?}",
                            other
                        )))
                    }
                },
            };
            Ok(Value(value))
        }
    }

    type Nested<'a> = BTreeMap<&'a str, BTreeMap<&'a str, BTreeMap<&'a str, Value>>>;

    pub fn serialize<S: Serializer>(results: &MetricResults, serializer: S) -> Result<S::Ok, S::Error> {
        let nested: Nested<'_> = results
            .iter()
            .map(|(platform, types)| {
                let types = types
                    .iter()
                    .map(|(mtype, metrics)| {
                        let metrics = metrics
                            .iter()
                            .map(|(name, v)| (name.as_str(), Value(*v)))
                            .collect();
                        (mtype.as_str(), metrics)
                    })
                    .collect();
                (platform.as_str(), types)
            })
            .collect();
        nested.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MetricResults, D::Error> {
        let nested: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>> =
            BTreeMap::deserialize(deserializer)?;
        Ok(nested
            .into_iter()
            .map(|(platform, types)| {
                let types = types
                    .into_iter()
                    .map(|(mtype, metrics)| {
                        (mtype, metrics.into_iter().map(|(name, v)| (name, v.0)).collect())
                    })
                    .collect();
                (platform, types)
            })
            .collect())
    }
}

/// Logs parallel to [`TaskResults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogs {
    pub simulation_logs: MeasurementLogs,
    pub ground_truth_logs: MeasurementLogs,
    pub metrics_logs: MetricLogs,
}

/// Result at a key path, flattening the failed-unit `None`.
pub fn measurement<'a>(
    results: &'a MeasurementResults,
    platform: &str,
    measurement_type: &str,
) -> Option<&'a MeasurementResult> {
    results.get(platform)?.get(measurement_type)?.as_ref()
}

/// Metric value at a key path, flattening the null value.
pub fn metric_value(
    results: &MetricResults,
    platform: &str,
    measurement_type: &str,
    metric: &str,
) -> MetricValue {
    *results.get(platform)?.get(measurement_type)?.get(metric)?
}

/// Log at a metric key path.
pub fn metric_log<'a>(
    logs: &'a MetricLogs,
    platform: &str,
    measurement_type: &str,
    metric: &str,
) -> Option<&'a ExecutionLog> {
    logs.get(platform)?.get(measurement_type)?.get(metric)
}

/// Log of one measurement unit.
pub fn measurement_log<'a>(
    logs: &'a MeasurementLogs,
    platform: &str,
    measurement_type: &str,
) -> Option<&'a ExecutionLog> {
    logs.get(platform)?.measurements.get(measurement_type)
}
