// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Error types for SocialSim
//!
//! Metric functions and measurement collaborators report failures through
//! these types; the orchestration layer turns every one of them into an
//! [`ExecutionLog`](crate::execution::ExecutionLog) at the unit where it happened.

use thiserror::Error;

/// Result type alias for crate-level operations
pub type Result<T> = std::result::Result<T, SocialSimError>;

/// Main error type for configuration and bundle I/O
#[derive(Error, Debug)]
pub enum SocialSimError {
    /// Metric computation error
    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    /// Measurement error
    #[error("Measurement error: {0}")]
    Measurement(#[from] MeasurementError),

    /// Malformed table
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Dataset error
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while comparing two measurement results.
///
/// Some variants describe inputs on which a metric is simply undefined
/// (see [`MetricError::is_not_computable`]); those surface as a null metric
/// value with a `not_computable` log, the rest as `metric_failed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Input is not of a numeric shape the metric accepts
    #[error("Non-numeric input: expected {expected}, got {found}")]
    NonNumeric {
        expected: &'static str,
        found: &'static str,
    },

    /// One side has no usable values
    #[error("Empty {side} input")]
    EmptyInput { side: &'static str },

    /// Input contains only (or unexpectedly) non-finite values
    #[error("Non-finite values in {side} input")]
    NonFinite { side: &'static str },

    /// A normalizing quantity is zero
    #[error("Zero denominator: {what}")]
    ZeroDenominator { what: &'static str },

    /// Too few aligned rows for the statistic
    #[error("Insufficient aligned rows: need {needed}, found {found}")]
    InsufficientRows { needed: usize, found: usize },

    /// Two distributions or arrays differ in length
    #[error("Shape mismatch: ground truth has {ground_truth} entries, simulation has {simulation}")]
    ShapeMismatch {
        ground_truth: usize,
        simulation: usize,
    },

    /// Input carries no `value` column
    #[error("Input has no value column")]
    MissingValueColumn,

    /// Simulation table lacks a ground-truth key column
    #[error("Missing key column: {0}")]
    MissingKeyColumn(String),

    /// Neither table has key columns to join on
    #[error("No key columns to join on")]
    NoKeyColumns,

    /// Grouped rank result lacks the requested selector
    #[error("Missing rank selector: {0}")]
    MissingSelector(String),

    /// No selector given and the result holds several
    #[error("Rank selector required: result holds {0} selectors")]
    AmbiguousSelector(usize),

    /// Parameter outside its valid domain
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Identifier does not name a known metric
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Cooperative cancellation or deadline fired
    #[error("Metric cancelled after {elapsed_ms}ms")]
    Cancelled { elapsed_ms: u64 },
}

impl MetricError {
    /// True for well-formed "undefined on this input" outcomes, as opposed
    /// to failures.
    pub fn is_not_computable(&self) -> bool {
        matches!(
            self,
            MetricError::NonNumeric { .. }
                | MetricError::EmptyInput { .. }
                | MetricError::NonFinite { .. }
                | MetricError::ZeroDenominator { .. }
                | MetricError::InsufficientRows { .. }
                | MetricError::ShapeMismatch { .. }
                | MetricError::MissingValueColumn
        )
    }
}

/// Errors from resolving, constructing or running a measurement collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// Configured name matches no measurement type
    #[error("Unknown measurement type: {0}")]
    UnknownType(String),

    /// Measurement type has no registered implementation
    #[error("No implementation registered for {0}")]
    NoProvider(String),

    /// Collaborator construction failed
    #[error("Failed to instantiate measurement: {0}")]
    Instantiation(String),

    /// Collaborator run failed
    #[error("Measurement failed to run: {0}")]
    Execution(String),
}

/// Errors building a [`Table`](crate::result::Table)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// Row key count differs from the column count
    #[error("Row {row} has {found} keys, table has {expected} key columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Column name appears twice
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// `value` used as a key column name
    #[error("\"value\" is reserved for the value column")]
    ReservedColumn,
}

/// Errors while partitioning a dataset
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// No record carries a platform attribute
    #[error("Dataset has {records} records but no platform column")]
    MissingPlatformColumn { records: usize },
}
