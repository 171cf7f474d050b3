//! Partition and key types shared by the storage layers.
//!
//! A [`Partition`] identifies one committed unit of storage — a logical
//! table (or ingestion endpoint) plus a calendar date — and builds the
//! canonical object keys for it. [`StorageKey`] is the composite
//! (namespace, path) address the document backend indexes by.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// File name of the committed columnar object within a partition.
pub const DATA_OBJECT: &str = "data.parquet";

/// File name of the fetched-empty sentinel within a partition.
pub const EMPTY_MARKER: &str = "empty.json";

/// Date format used in partition key segments.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A composite storage address: namespace plus relative path.
///
/// The namespacing decorator produces flat keys of the form
/// `"<namespace>/<path>"`; this type splits and joins that form so the
/// document backend can index on the pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    /// Key-space the object belongs to (first path segment; may be empty).
    pub namespace: String,
    /// Path relative to the namespace.
    pub path: String,
}

impl StorageKey {
    /// Create a key from explicit parts.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Split a flat key at its first `/` into (namespace, path).
    ///
    /// A key with no separator has an empty namespace.
    pub fn split(key: &str) -> Self {
        match key.split_once('/') {
            Some((ns, rest)) => Self::new(ns, rest),
            None => Self::new("", key),
        }
    }

    /// Join the parts back into a flat key.
    pub fn join(&self) -> String {
        if self.namespace.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.namespace, self.path)
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join())
    }
}

/// The observable state of a partition.
///
/// The three states are mutually exclusive and always distinguishable by
/// read operations: `Absent` means no ingestion was ever attempted,
/// `Empty` means an ingestion committed zero rows (sentinel present),
/// `Populated` means a committed data object is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionState {
    /// Never attempted; neither data object nor sentinel exists.
    Absent,
    /// Attempted with zero rows; the empty sentinel is committed.
    Empty,
    /// A committed data object is present.
    Populated,
}

/// One unit of committed storage: a logical table (or endpoint) and a date.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    /// Logical table or ingestion endpoint name, e.g. `"daily_quotes"`.
    pub table: String,
    /// The calendar date the partition covers.
    pub date: NaiveDate,
}

impl Partition {
    /// Create a partition reference.
    pub fn new(table: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            table: table.into(),
            date,
        }
    }

    /// The `date=YYYY-MM-DD` key segment for this partition.
    pub fn segment(&self) -> String {
        format!("date={}", self.date.format(DATE_FORMAT))
    }

    /// Key of the committed columnar object.
    pub fn data_key(&self) -> String {
        format!("{}/{}/{}", self.table, self.segment(), DATA_OBJECT)
    }

    /// Key of the fetched-empty sentinel.
    pub fn sentinel_key(&self) -> String {
        format!("{}/{}/{}", self.table, self.segment(), EMPTY_MARKER)
    }

    /// Parse a committed object key back into a partition reference.
    ///
    /// Accepts only exact `<table>/date=YYYY-MM-DD/<data-or-empty-marker>`
    /// keys; anything else — including temp objects left by interrupted
    /// writes — returns `None`.
    pub fn parse_key(key: &str) -> Option<Self> {
        let mut parts = key.split('/');
        let table = parts.next()?;
        let segment = parts.next()?;
        let object = parts.next()?;
        if parts.next().is_some() || table.is_empty() {
            return None;
        }
        if object != DATA_OBJECT && object != EMPTY_MARKER {
            return None;
        }
        let date_str = segment.strip_prefix("date=")?;
        let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).ok()?;
        Some(Self::new(table, date))
    }

    /// Whether `key` is this partition's committed data object.
    pub fn is_data_key(key: &str) -> bool {
        Self::parse_key(key).is_some() && key.ends_with(DATA_OBJECT)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.segment())
    }
}
