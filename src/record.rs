//! File records: a path together with the time coverage it represents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// An indexed file: its path, the `(start, end)` coverage interval and any
/// values parsed from user-defined placeholders.
///
/// Records are immutable once constructed; `start <= end` is maintained by
/// overshoot compensation during filename parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl FileRecord {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            path: path.into(),
            start,
            end,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether the coverage overlaps the semi-open query window
    /// `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && self.end >= start
    }

    /// Whether the coverage contains the instant (both bounds inclusive).
    #[must_use]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Distance from the coverage to an instant: the smaller of the
    /// absolute offsets to either bound. Zero only at the bounds themselves.
    #[must_use]
    pub fn distance_to(&self, timestamp: NaiveDateTime) -> Duration {
        let to_start = (self.start - timestamp).abs();
        let to_end = (self.end - timestamp).abs();
        to_start.min(to_end)
    }
}

/// A partial record as produced by filename parsing or a handler's
/// `get_info`. Fields left `None` are unknown to that source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordInfo {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub attributes: BTreeMap<String, String>,
}

impl RecordInfo {
    /// Overlay another partial record on top of this one. Present fields of
    /// `other` win; attributes are merged with `other` taking precedence.
    pub fn update(&mut self, other: RecordInfo) {
        if other.start.is_some() {
            self.start = other.start;
        }
        if other.end.is_some() {
            self.end = other.end;
        }
        self.attributes.extend(other.attributes);
    }

    /// Finalize into a [`FileRecord`], defaulting a missing end time to the
    /// start. Returns `None` when no start time is known.
    #[must_use]
    pub fn into_record(self, path: &Path) -> Option<FileRecord> {
        let start = self.start?;
        Some(FileRecord {
            path: path.to_path_buf(),
            start,
            end: self.end.unwrap_or(start),
            attributes: self.attributes,
        })
    }
}
