//! Common value types shared across bucketwatch crates.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-modified timestamp of an object.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a watch configuration.
pub type WatchId = String;

/// A point-in-time view of a bucket: object url → last-modified.
pub type Snapshot = HashMap<String, Timestamp>;

/// The kind of change detected for a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// One object as seen by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedObject {
    pub url: String,
    pub updated: Timestamp,
}

/// A persisted record of an object previously seen by a watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub url: String,
    pub updated: Timestamp,
}
