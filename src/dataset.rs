// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Event datasets handed to measurement collaborators.
//!
//! Records are opaque apart from their `platform` attribute, which is all
//! the orchestrator needs to partition them.

use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: Some(platform.into()),
            fields: serde_json::Map::new(),
        }
    }

    /// Builder-style field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Ordered, cheaply clonable list of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Record>", into = "Vec<Record>")]
pub struct Dataset {
    records: Arc<Vec<Record>>,
}

impl From<Vec<Record>> for Dataset {
    fn from(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }
}

impl From<Dataset> for Vec<Record> {
    fn from(dataset: Dataset) -> Self {
        Arc::try_unwrap(dataset.records).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        records.into()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct platform names present.
    pub fn platforms(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .filter_map(|r| r.platform.as_deref())
            .collect()
    }

    /// Records of one platform, in dataset order.
    ///
    /// Fails when the dataset has records but none of them carries a
    /// platform at all.
    pub fn subset(&self, platform: &str) -> Result<Dataset, DatasetError> {
        if !self.records.is_empty() && self.records.iter().all(|r| r.platform.is_none()) {
            return Err(DatasetError::MissingPlatformColumn {
                records: self.records.len(),
            });
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.platform.as_deref() == Some(platform))
            .cloned()
            .collect::<Vec<_>>()
            .into())
    }

    /// The first `limit` records.
    pub fn truncated(&self, limit: usize) -> Dataset {
        if self.records.len() <= limit {
            return self.clone();
        }
        self.records[..limit].to_vec().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Record::new("twitter").with_field("id", 1),
            Record::new("github").with_field("id", 2),
            Record::new("twitter").with_field("id", 3),
        ])
    }

    #[test]
    fn test_subset_keeps_order() {
        let twitter = sample().subset("twitter").unwrap();
        let ids: Vec<i64> = twitter
            .records()
            .iter()
            .map(|r| r.fields["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(sample().subset("reddit").unwrap().is_empty());
    }

    #[test]
    fn test_subset_without_platform_column_fails() {
        let dataset: Dataset = serde_json::from_str(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert_eq!(
            dataset.subset("twitter"),
            Err(DatasetError::MissingPlatformColumn { records: 2 })
        );
        assert!(Dataset::default().subset("twitter").unwrap().is_empty());
    }

    #[test]
    fn test_truncated() {
        let data = sample();
        assert_eq!(data.truncated(2).len(), 2);
        assert_eq!(data.truncated(10).len(), 3);
        assert_eq!(data.truncated(1).records()[0].fields["id"], 1);
    }

    #[test]
    fn test_json_roundtrip_keeps_fields() {
        let json = r#"[{"platform": "github", "actionType": "PushEvent", "id": 7}]"#;
        let data: Dataset = serde_json::from_str(json).unwrap();
        assert_eq!(data.platforms().into_iter().collect::<Vec<_>>(), vec!["github"]);
        let back: serde_json::Value = serde_json::to_value(&data).unwrap();
        assert_eq!(back[0]["actionType"], "PushEvent");
    }
}
