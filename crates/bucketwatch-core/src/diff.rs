//! Change detection between two bucket snapshots.
//!
//! Identity is the object url; "changed" means the found last-modified
//! timestamp is strictly later than the stored one. Equal timestamps are
//! never reported. Outputs are sets, so callers must not rely on order.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

/// Three disjoint sets of urls produced by [`compute_diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub created: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl DiffResult {
    /// True when nothing was created, updated, or deleted.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of changed urls.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Compute the created / updated / deleted sets between `stored` and `found`.
///
/// Every url in `found` is either new (created), strictly newer (updated),
/// or unchanged. Stored urls consumed by the pass are removed from a working
/// set; whatever is left over has disappeared from the bucket (deleted).
pub fn compute_diff<T: Ord>(
    stored: &HashMap<String, T>,
    found: &HashMap<String, T>,
) -> DiffResult {
    let mut remaining: HashSet<&str> = stored.keys().map(String::as_str).collect();
    let mut diff = DiffResult::default();

    for (url, found_at) in found {
        match stored.get(url) {
            None => {
                diff.created.insert(url.clone());
            }
            Some(stored_at) => {
                if found_at > stored_at {
                    diff.updated.insert(url.clone());
                }
                remaining.remove(url.as_str());
            }
        }
    }

    diff.deleted = remaining.into_iter().map(str::to_owned).collect();
    diff
}
