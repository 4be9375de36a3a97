// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Cooperative cancellation for long-running metrics.

use crate::error::MetricError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation flag plus optional deadline, polled by quadratic loops.
///
/// Clones share the flag, so a caller can cancel a unit running elsewhere.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires on explicit [`cancel`](Self::cancel).
    pub fn never() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline: None,
        }
    }

    /// A token that also fires once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            started,
            deadline: started.checked_add(timeout),
        }
    }

    /// Token for an optional millisecond budget.
    pub fn from_millis(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) => Self::with_timeout(Duration::from_millis(ms)),
            None => Self::never(),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<(), MetricError> {
        if self.is_cancelled() {
            Err(MetricError::Cancelled {
                elapsed_ms: self.elapsed().as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
