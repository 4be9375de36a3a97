// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Measurement dispatch.
//!
//! Measurement algorithms live outside this crate. They plug in through
//! [`MeasurementProvider`] (construct) and [`Measurement`] (run), and a
//! [`MeasurementSuite`] maps each [`MeasurementType`] to its provider.

use crate::config::MeasurementConfig;
use crate::dataset::Dataset;
use crate::error::MeasurementError;
use crate::result::MeasurementResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Closed set of measurement categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    SocialActivity,
    InformationCascades,
    SocialStructure,
    CrossPlatform,
    MultiPlatform,
    Recurrence,
    PersistentGroups,
}

impl MeasurementType {
    pub const ALL: [MeasurementType; 7] = [
        MeasurementType::SocialActivity,
        MeasurementType::InformationCascades,
        MeasurementType::SocialStructure,
        MeasurementType::CrossPlatform,
        MeasurementType::MultiPlatform,
        MeasurementType::Recurrence,
        MeasurementType::PersistentGroups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::SocialActivity => "social_activity",
            MeasurementType::InformationCascades => "information_cascades",
            MeasurementType::SocialStructure => "social_structure",
            MeasurementType::CrossPlatform => "cross_platform",
            MeasurementType::MultiPlatform => "multi_platform",
            MeasurementType::Recurrence => "recurrence",
            MeasurementType::PersistentGroups => "persistent_groups",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementType {
    type Err = MeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeasurementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MeasurementError::UnknownType(s.to_string()))
    }
}

/// Output format for collaborators that persist their results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Json,
    Csv,
}

/// Options passed through unchanged to every [`Measurement::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub verbose: bool,
    pub save: bool,
    pub save_directory: PathBuf,
    pub save_format: SaveFormat,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            save: false,
            save_directory: PathBuf::from("./"),
            save_format: SaveFormat::Json,
        }
    }
}

/// Everything a collaborator is constructed from.
#[derive(Debug, Clone)]
pub struct MeasurementContext {
    /// Platform subset, or the whole dataset for multi-platform.
    pub dataset: Dataset,
    /// `None` for the multi-platform pseudo-platform.
    pub platform: Option<String>,
    pub config: MeasurementConfig,
    pub metadata: Option<Arc<serde_json::Value>>,
}

/// A constructed measurement collaborator.
pub trait Measurement: Send {
    fn run(&mut self, options: &RunOptions) -> Result<MeasurementResult, MeasurementError>;
}

impl<F> Measurement for F
where
    F: FnMut(&RunOptions) -> Result<MeasurementResult, MeasurementError> + Send,
{
    fn run(&mut self, options: &RunOptions) -> Result<MeasurementResult, MeasurementError> {
        self(options)
    }
}

/// Constructs collaborators of one measurement type.
pub trait MeasurementProvider: Send + Sync {
    fn instantiate(
        &self,
        context: MeasurementContext,
    ) -> Result<Box<dyn Measurement>, MeasurementError>;
}

impl<F> MeasurementProvider for F
where
    F: Fn(MeasurementContext) -> Result<Box<dyn Measurement>, MeasurementError> + Send + Sync,
{
    fn instantiate(
        &self,
        context: MeasurementContext,
    ) -> Result<Box<dyn Measurement>, MeasurementError> {
        self(context)
    }
}

/// Provider built from a plain function of (context, options).
pub struct FnProvider<F>(Arc<F>);

struct FnMeasurement<F> {
    f: Arc<F>,
    context: MeasurementContext,
}

/// Wrap `f` as a provider whose collaborators call `f` on every run.
pub fn from_fn<F>(f: F) -> FnProvider<F>
where
    F: Fn(&MeasurementContext, &RunOptions) -> Result<MeasurementResult, MeasurementError>
        + Send
        + Sync
        + 'static,
{
    FnProvider(Arc::new(f))
}

impl<F> MeasurementProvider for FnProvider<F>
where
    F: Fn(&MeasurementContext, &RunOptions) -> Result<MeasurementResult, MeasurementError>
        + Send
        + Sync
        + 'static,
{
    fn instantiate(
        &self,
        context: MeasurementContext,
    ) -> Result<Box<dyn Measurement>, MeasurementError> {
        Ok(Box::new(FnMeasurement {
            f: Arc::clone(&self.0),
            context,
        }))
    }
}

impl<F> Measurement for FnMeasurement<F>
where
    F: Fn(&MeasurementContext, &RunOptions) -> Result<MeasurementResult, MeasurementError>
        + Send
        + Sync,
{
    fn run(&mut self, options: &RunOptions) -> Result<MeasurementResult, MeasurementError> {
        (self.f)(&self.context, options)
    }
}

type ProviderSlot = Option<Arc<dyn MeasurementProvider>>;

/// One provider slot per [`MeasurementType`].
#[derive(Clone, Default)]
pub struct MeasurementSuite {
    social_activity: ProviderSlot,
    information_cascades: ProviderSlot,
    social_structure: ProviderSlot,
    cross_platform: ProviderSlot,
    multi_platform: ProviderSlot,
    recurrence: ProviderSlot,
    persistent_groups: ProviderSlot,
}

impl MeasurementSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration; replaces an earlier provider.
    pub fn with(mut self, kind: MeasurementType, provider: impl MeasurementProvider + 'static) -> Self {
        self.register(kind, Arc::new(provider));
        self
    }

    pub fn register(&mut self, kind: MeasurementType, provider: Arc<dyn MeasurementProvider>) {
        *self.slot_mut(kind) = Some(provider);
    }

    fn slot_mut(&mut self, kind: MeasurementType) -> &mut ProviderSlot {
        match kind {
            MeasurementType::SocialActivity => &mut self.social_activity,
            MeasurementType::InformationCascades => &mut self.information_cascades,
            MeasurementType::SocialStructure => &mut self.social_structure,
            MeasurementType::CrossPlatform => &mut self.cross_platform,
            MeasurementType::MultiPlatform => &mut self.multi_platform,
            MeasurementType::Recurrence => &mut self.recurrence,
            MeasurementType::PersistentGroups => &mut self.persistent_groups,
        }
    }

    pub fn provider(&self, kind: MeasurementType) -> Option<&Arc<dyn MeasurementProvider>> {
        match kind {
            MeasurementType::SocialActivity => &self.social_activity,
            MeasurementType::InformationCascades => &self.information_cascades,
            MeasurementType::SocialStructure => &self.social_structure,
            MeasurementType::CrossPlatform => &self.cross_platform,
            MeasurementType::MultiPlatform => &self.multi_platform,
            MeasurementType::Recurrence => &self.recurrence,
            MeasurementType::PersistentGroups => &self.persistent_groups,
        }
        .as_ref()
    }

    /// Provider for a configured measurement-type name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn MeasurementProvider>, MeasurementError> {
        let kind: MeasurementType = name.parse()?;
        self.provider(kind)
            .cloned()
            .ok_or_else(|| MeasurementError::NoProvider(kind.to_string()))
    }

    /// Types with a registered provider.
    pub fn registered(&self) -> Vec<MeasurementType> {
        MeasurementType::ALL
            .into_iter()
            .filter(|k| self.provider(*k).is_some())
            .collect()
    }
}

impl fmt::Debug for MeasurementSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementSuite")
            .field("registered", &self.registered())
            .finish()
    }
}
