// SocialSim - Simulation evaluation metrics
// Copyright (c) 2025 The SocialSim Authors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Measurement result shapes.
//!
//! A measurement collaborator produces one [`MeasurementResult`] per
//! (platform, measurement type). Results are immutable once produced; the
//! metric library only ever reads them.

use crate::error::TableError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the single value column of a [`Table`].
pub const VALUE_COLUMN: &str = "value";

/// Output of one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MeasurementResult {
    /// A single number.
    Scalar(f64),
    /// A raw numeric array.
    Sequence(#[serde(deserialize_with = "nan_vec_from_nulls")] Vec<f64>),
    /// Key columns plus one value column.
    Table(Table),
    /// Ranked entities per group, under one or more selectors.
    Ranked(RankedGroups),
}

impl MeasurementResult {
    /// Shape name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MeasurementResult::Scalar(_) => "scalar",
            MeasurementResult::Sequence(_) => "sequence",
            MeasurementResult::Table(_) => "table",
            MeasurementResult::Ranked(_) => "ranked groups",
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MeasurementResult::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            MeasurementResult::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_ranked(&self) -> Option<&RankedGroups> {
        match self {
            MeasurementResult::Ranked(r) => Some(r),
            _ => None,
        }
    }

    /// Number of entries (1 for scalars).
    pub fn len(&self) -> usize {
        match self {
            MeasurementResult::Scalar(_) => 1,
            MeasurementResult::Sequence(v) => v.len(),
            MeasurementResult::Table(t) => t.len(),
            MeasurementResult::Ranked(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<f64> for MeasurementResult {
    fn from(value: f64) -> Self {
        MeasurementResult::Scalar(value)
    }
}

impl From<Vec<f64>> for MeasurementResult {
    fn from(values: Vec<f64>) -> Self {
        MeasurementResult::Sequence(values)
    }
}

impl From<Table> for MeasurementResult {
    fn from(table: Table) -> Self {
        MeasurementResult::Table(table)
    }
}

impl From<RankedGroups> for MeasurementResult {
    fn from(groups: RankedGroups) -> Self {
        MeasurementResult::Ranked(groups)
    }
}

/// A key cell. Integers order before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{}", v),
            Key::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

/// One table row. A missing value is NaN (`null` in JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub keys: Vec<Key>,
    #[serde(deserialize_with = "nan_from_null")]
    pub value: f64,
}

/// Rows sharing zero or more key columns plus one `value` column.
///
/// Row order is the producer's order; for ranked tables it is the rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct TableRepr {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<TableRepr> for Table {
    type Error = TableError;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        Table::with_rows(repr.columns, repr.rows)
    }
}

impl Table {
    /// Create an empty table with the given key columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, c) in columns.iter().enumerate() {
            if c == VALUE_COLUMN {
                return Err(TableError::ReservedColumn);
            }
            if columns[..i].contains(c) {
                return Err(TableError::DuplicateColumn(c.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table from prepared rows.
    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Row>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push(row.keys, row.value)?;
        }
        Ok(table)
    }

    /// Single-key-column table, e.g. a time series keyed by date.
    pub fn series<K: Into<Key>>(
        column: &str,
        points: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new([column])?;
        for (key, value) in points {
            table.push(vec![key.into()], value)?;
        }
        Ok(table)
    }

    /// Append a row.
    pub fn push(&mut self, keys: Vec<Key>, value: f64) -> Result<(), TableError> {
        if keys.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: keys.len(),
            });
        }
        self.rows.push(Row { keys, value });
        Ok(())
    }

    /// Key column names (the `value` column is implicit).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The value column in row order.
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.value).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy of the table without rows whose value is NaN or infinite.
    pub fn finite_rows(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.value.is_finite())
                .cloned()
                .collect(),
        }
    }
}

/// Ranked entity: a single id, or a pair of ids (e.g. user-repo).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Single(String),
    Pair(String, String),
}

impl Entity {
    /// Composite key; pairs are joined with `-`.
    pub fn key(&self) -> String {
        match self {
            Entity::Single(id) => id.clone(),
            Entity::Pair(a, b) => format!("{}-{}", a, b),
        }
    }
}

impl From<&str> for Entity {
    fn from(id: &str) -> Self {
        Entity::Single(id.to_string())
    }
}

/// An entity with the score it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub entity: Entity,
    #[serde(default)]
    pub score: f64,
}

impl RankedEntry {
    pub fn new(entity: impl Into<Entity>, score: f64) -> Self {
        Self {
            entity: entity.into(),
            score,
        }
    }
}

/// Group → ranked list, under named selectors (e.g. "user", "node").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedGroups(BTreeMap<String, BTreeMap<String, Vec<RankedEntry>>>);

impl RankedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one group's ranking.
    pub fn with_group(
        mut self,
        selector: impl Into<String>,
        group: impl Into<String>,
        ranking: Vec<RankedEntry>,
    ) -> Self {
        self.insert(selector, group, ranking);
        self
    }

    pub fn insert(
        &mut self,
        selector: impl Into<String>,
        group: impl Into<String>,
        ranking: Vec<RankedEntry>,
    ) {
        self.0
            .entry(selector.into())
            .or_default()
            .insert(group.into(), ranking);
    }

    pub fn selector(&self, name: &str) -> Option<&BTreeMap<String, Vec<RankedEntry>>> {
        self.0.get(name)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of selectors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn nan_vec_from_nulls<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rejects_reserved_and_duplicate_columns() {
        assert_eq!(Table::new(["value"]), Err(TableError::ReservedColumn));
        assert_eq!(
            Table::new(["node", "node"]),
            Err(TableError::DuplicateColumn("node".to_string()))
        );
    }

    #[test]
    fn test_table_row_width_checked() {
        let mut table = Table::new(["node", "date"]).unwrap();
        let err = table.push(vec![Key::from("a")], 1.0).unwrap_err();
        assert!(matches!(err, TableError::RowWidth { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_key_ordering_ints_before_text() {
        let mut keys = vec![Key::from("b"), Key::from(10i64), Key::from("a"), Key::from(2i64)];
        keys.sort();
        assert_eq!(
            keys,
            vec![Key::from(2i64), Key::from(10i64), Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn test_table_json_null_is_nan() {
        let json = r#"{"type": "table", "data": {
            "columns": ["date"],
            "rows": [{"keys": ["2017-01-01"], "value": 3.0},
                     {"keys": ["2017-01-02"], "value": null}]
        }}"#;
        let result: MeasurementResult = serde_json::from_str(json).unwrap();
        let table = result.as_table().unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows()[1].value.is_nan());
        assert_eq!(table.finite_rows().len(), 1);
    }

    #[test]
    fn test_table_json_validated() {
        let json = r#"{"type": "table", "data": {
            "columns": ["date"],
            "rows": [{"keys": ["2017-01-01", 4], "value": 3.0}]
        }}"#;
        assert!(serde_json::from_str::<MeasurementResult>(json).is_err());
    }

    #[test]
    fn test_entity_pair_key() {
        let json = r#"[["alice", "repo1"], "bob"]"#;
        let entities: Vec<Entity> = serde_json::from_str(json).unwrap();
        assert_eq!(entities[0].key(), "alice-repo1");
        assert_eq!(entities[1].key(), "bob");
    }

    #[test]
    fn test_ranked_groups_roundtrip() {
        let groups = RankedGroups::new().with_group(
            "user",
            "CVE-1",
            vec![RankedEntry::new("alice", 3.0), RankedEntry::new("bob", 1.0)],
        );
        let json = serde_json::to_string(&MeasurementResult::from(groups.clone())).unwrap();
        let back: MeasurementResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_ranked(), Some(&groups));
    }
}
