// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Run observers.
//!
//! The orchestrator reports every finished unit as a [`RunEvent`] to an
//! injectable [`RunObserver`]. The result and log bundles are the only
//! output of a run; observers see progress as it happens and never affect
//! the outcome.

use crate::execution::{ExecutionLog, LogStatus};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Granularity of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Platform subsetting.
    Subset,
    /// Measurement resolution, construction and run.
    Measurement,
    /// One metric call.
    Metric,
}

/// Which measurement collection a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    GroundTruth,
    Simulation,
}

/// A finished unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub stage: Stage,
    pub side: Option<Side>,
    pub platform: String,
    pub measurement_type: Option<String>,
    pub metric: Option<String>,
    pub log: ExecutionLog,
    pub elapsed_ms: u64,
}

impl RunEvent {
    pub fn new(stage: Stage, platform: impl Into<String>, log: ExecutionLog) -> Self {
        Self {
            stage,
            side: None,
            platform: platform.into(),
            measurement_type: None,
            metric: None,
            log,
            elapsed_ms: 0,
        }
    }

    pub fn measurement(mut self, measurement_type: impl Into<String>) -> Self {
        self.measurement_type = Some(measurement_type.into());
        self
    }

    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// `platform/measurement/metric` path of the unit.
    pub fn path(&self) -> String {
        let mut path = self.platform.clone();
        for part in [&self.measurement_type, &self.metric].into_iter().flatten() {
            path.push('/');
            path.push_str(part);
        }
        path
    }
}

/// Sink for unit events. Called from worker threads.
pub trait RunObserver: Send + Sync {
    fn record(&self, event: RunEvent);
}

impl<T: RunObserver + ?Sized> RunObserver for Arc<T> {
    fn record(&self, event: RunEvent) {
        (**self).record(event)
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn record(&self, event: RunEvent) {
        let side = match event.side {
            Some(Side::GroundTruth) => "ground truth ",
            Some(Side::Simulation) => "simulation ",
            None => "",
        };
        match event.log.status {
            LogStatus::Success => log::debug!(
                "{}{:?} {} done in {}ms",
                side,
                event.stage,
                event.path(),
                event.elapsed_ms
            ),
            LogStatus::NotComputable | LogStatus::Unavailable => {
                log::info!("{}{:?} {}: {}", side, event.stage, event.path(), event.log)
            }
            _ => log::warn!("{}{:?} {}: {}", side, event.stage, event.path(), event.log),
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn record(&self, _event: RunEvent) {}
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in arrival order.
    pub fn events(&self) -> Vec<RunEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn events_by_status(&self, status: LogStatus) -> Vec<RunEvent> {
        self.filtered(|e| e.log.status == status)
    }

    pub fn events_by_stage(&self, stage: Stage) -> Vec<RunEvent> {
        self.filtered(|e| e.stage == stage)
    }

    fn filtered(&self, pred: impl Fn(&RunEvent) -> bool) -> Vec<RunEvent> {
        self.lock().iter().filter(|e| pred(e)).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RunEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunObserver for MemoryObserver {
    fn record(&self, event: RunEvent) {
        self.lock().push(event);
    }
}

/// Stamps a side onto events before passing them on.
pub(crate) struct SideObserver<'a> {
    pub(crate) inner: &'a dyn RunObserver,
    pub(crate) side: Side,
}

impl RunObserver for SideObserver<'_> {
    fn record(&self, mut event: RunEvent) {
        event.side = Some(self.side);
        self.inner.record(event);
    }
}
