//! [`SnapshotStore`] over the redb [`StateStore`].

use async_trait::async_trait;

use bucketwatch_core::{Snapshot, TrackedItem};
use bucketwatch_state::{StateResult, StateStore};

use crate::ports::SnapshotStore;

#[async_trait]
impl SnapshotStore for StateStore {
    async fn load_all(&self, watch_id: &str) -> StateResult<Snapshot> {
        self.load_snapshot(watch_id)
    }

    async fn put(&self, watch_id: &str, item: &TrackedItem) -> StateResult<()> {
        self.put_item(watch_id, item)
    }

    async fn delete(&self, watch_id: &str, url: &str) -> StateResult<()> {
        // Already gone counts as deleted.
        self.delete_item(watch_id, url).map(|_| ())
    }
}
