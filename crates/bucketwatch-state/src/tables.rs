//! redb table definitions for the bucketwatch state store.

use redb::TableDefinition;

/// Watch configurations keyed by watch id.
pub const WATCHES: TableDefinition<&str, &[u8]> = TableDefinition::new("watches");

/// Tracked objects keyed by `{watch_id}:{url}`.
pub const TRACKED_ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("tracked_items");

/// Monotonic counters (id allocation).
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter name used to allocate watch ids.
pub const WATCH_ID_COUNTER: &str = "watch_id";
