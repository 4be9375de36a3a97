// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! `compare` subcommand: score stored measurement results.

use serde::de::DeserializeOwned;
use serde::Serialize;
use socialsim::{
    Configuration, LogStatus, MeasurementResults, MetricLogs, MetricResults, MetricsEngine,
    RunnerConfig, SocialSimError,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Input files of one comparison.
#[derive(Debug, Clone)]
pub struct CompareInputs {
    pub ground_truth: PathBuf,
    pub simulation: PathBuf,
    pub config: PathBuf,
}

/// What `compare` writes.
#[derive(Debug, Serialize)]
pub struct CompareReport {
    #[serde(serialize_with = "socialsim::bundle::metric_json::serialize")]
    pub metrics: MetricResults,
    pub metrics_logs: MetricLogs,
}

impl CompareReport {
    /// Count of metric logs per status.
    pub fn status_counts(&self) -> BTreeMap<LogStatus, usize> {
        let mut counts = BTreeMap::new();
        for log in self
            .metrics_logs
            .values()
            .flat_map(|types| types.values())
            .flat_map(|metrics| metrics.values())
        {
            *counts.entry(log.status).or_insert(0) += 1;
        }
        counts
    }
}

/// Compare errors.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    SocialSim(#[from] SocialSimError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, CompareError> {
    let text = fs::read_to_string(path).map_err(|source| CompareError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CompareError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load both result collections and the configuration, then run the
/// metrics engine.
pub fn compare(inputs: &CompareInputs, runner: &RunnerConfig) -> Result<CompareReport, CompareError> {
    let ground_truth: MeasurementResults = load(&inputs.ground_truth)?;
    let simulation: MeasurementResults = load(&inputs.simulation)?;
    let configuration: Configuration = load(&inputs.config)?;

    info!(
        "Comparing {} ground-truth and {} simulation platform(s)",
        ground_truth.len(),
        simulation.len()
    );

    let engine = MetricsEngine::new(runner)?;
    let (metrics, metrics_logs) = engine.run(&ground_truth, &simulation, &configuration);
    let report = CompareReport {
        metrics,
        metrics_logs,
    };

    for (status, count) in report.status_counts() {
        if status.is_failure() {
            warn!("{} metric(s) {}", count, status);
        } else {
            info!("{} metric(s) {}", count, status);
        }
    }
    Ok(report)
}

/// Pretty JSON to `output`, or stdout.
pub fn write_report(report: &CompareReport, output: Option<&Path>) -> Result<(), CompareError> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}
