//! StateStore — redb-backed persistence for bucketwatch.
//!
//! Provides validated CRUD over watch configurations and scoped access to
//! each watch's tracked-object snapshot. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use bucketwatch_core::{Snapshot, TrackedItem, WatchConfig, WatchDraft};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(WATCHES).map_err(map_err!(Table))?;
        txn.open_table(TRACKED_ITEMS).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Watches ────────────────────────────────────────────────────

    /// Validate and insert a new watch. The id is allocated here; a missing
    /// `seq` places the watch after every existing one.
    pub fn create_watch(&self, draft: &WatchDraft) -> StateResult<WatchConfig> {
        draft.validate()?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let watch;
        {
            let mut counters = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
            let next_id = counters
                .get(WATCH_ID_COUNTER)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0)
                + 1;
            counters
                .insert(WATCH_ID_COUNTER, next_id)
                .map_err(map_err!(Write))?;

            let mut table = txn.open_table(WATCHES).map_err(map_err!(Table))?;
            let mut max_seq = 0;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let existing: WatchConfig =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                max_seq = max_seq.max(existing.seq);
            }

            watch = WatchConfig::from_draft(format!("watch-{next_id}"), max_seq + 1, draft.clone());
            let value = serde_json::to_vec(&watch).map_err(map_err!(Serialize))?;
            table
                .insert(watch.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(watch_id = %watch.id, seq = watch.seq, "watch created");
        Ok(watch)
    }

    /// Get a watch by id.
    pub fn get_watch(&self, id: &str) -> StateResult<Option<WatchConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WATCHES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let watch: WatchConfig =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(watch))
            }
            None => Ok(None),
        }
    }

    /// Get a watch by id, failing with `NotFound` when it does not exist.
    pub fn find_watch(&self, id: &str) -> StateResult<WatchConfig> {
        self.get_watch(id)?
            .ok_or_else(|| StateError::NotFound(format!("watch {id}")))
    }

    /// List all watches ordered by `seq`, then id.
    pub fn list_watches(&self) -> StateResult<Vec<WatchConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WATCHES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let watch: WatchConfig =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(watch);
        }
        results.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    /// Validate and replace an existing watch. A missing `seq` keeps the
    /// current one.
    pub fn update_watch(&self, id: &str, draft: &WatchDraft) -> StateResult<WatchConfig> {
        draft.validate()?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let watch;
        {
            let mut table = txn.open_table(WATCHES).map_err(map_err!(Table))?;
            let current: WatchConfig = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(format!("watch {id}"))),
            };

            watch = WatchConfig::from_draft(current.id, current.seq, draft.clone());
            let value = serde_json::to_vec(&watch).map_err(map_err!(Serialize))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(watch_id = %id, "watch updated");
        Ok(watch)
    }

    /// Delete a watch and its tracked items in one transaction. Returns the
    /// number of items removed alongside it.
    pub fn delete_watch(&self, id: &str) -> StateResult<usize> {
        let prefix = item_prefix(id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(WATCHES).map_err(map_err!(Table))?;
            if table.remove(id).map_err(map_err!(Write))?.is_none() {
                return Err(StateError::NotFound(format!("watch {id}")));
            }

            let mut items = txn.open_table(TRACKED_ITEMS).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in items.range(prefix.as_str()..).map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                let key = key.value();
                if !key.starts_with(&prefix) {
                    break;
                }
                keys.push(key.to_string());
            }
            for key in &keys {
                items.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            removed = keys.len();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(watch_id = %id, items = removed, "watch deleted");
        Ok(removed)
    }

    // ── Tracked items ──────────────────────────────────────────────

    /// Insert or update the tracked record for `item.url` under a watch.
    /// Fails with `NotFound` if the watch does not exist.
    pub fn put_item(&self, watch_id: &str, item: &TrackedItem) -> StateResult<()> {
        let key = item_key(watch_id, &item.url);
        let value = serde_json::to_vec(item).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let watches = txn.open_table(WATCHES).map_err(map_err!(Table))?;
            if watches.get(watch_id).map_err(map_err!(Read))?.is_none() {
                return Err(StateError::NotFound(format!("watch {watch_id}")));
            }
            let mut table = txn.open_table(TRACKED_ITEMS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List all tracked items of a watch (by key prefix scan).
    pub fn list_items(&self, watch_id: &str) -> StateResult<Vec<TrackedItem>> {
        let prefix = item_prefix(watch_id);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TRACKED_ITEMS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let item: TrackedItem =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(item);
        }
        Ok(results)
    }

    /// Load a watch's snapshot as url → last-modified.
    pub fn load_snapshot(&self, watch_id: &str) -> StateResult<Snapshot> {
        let snapshot: Snapshot = self
            .list_items(watch_id)?
            .into_iter()
            .map(|item| (item.url, item.updated))
            .collect();
        debug!(%watch_id, items = snapshot.len(), "snapshot loaded");
        Ok(snapshot)
    }

    /// Delete one tracked item. Returns true if it existed.
    pub fn delete_item(&self, watch_id: &str, url: &str) -> StateResult<bool> {
        let key = item_key(watch_id, url);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TRACKED_ITEMS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

fn item_prefix(watch_id: &str) -> String {
    format!("{watch_id}:")
}

fn item_key(watch_id: &str, url: &str) -> String {
    format!("{watch_id}:{url}")
}
