//! Capability traits at the edges of a run.
//!
//! The reconciler only talks to storage, the bucket, and the message topic
//! through these traits. Transport adapters live in `bucketwatch-gcs`; the
//! redb snapshot store implementation lives in [`crate::snapshot`].

use std::sync::Arc;

use async_trait::async_trait;

use bucketwatch_core::{ListedObject, Snapshot, TrackedItem, WatchConfig};
use bucketwatch_state::StateResult;

use crate::error::{ListResult, NotifyResult};
use crate::notify::OutboundMessage;

/// Enumerates the objects currently in a bucket.
///
/// One call is one complete pass over the bucket; a failed listing is
/// retried by listing again from scratch.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list(&self, bucket: &str) -> ListResult<Vec<ListedObject>>;
}

/// Persists tracked items scoped by watch id.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_all(&self, watch_id: &str) -> StateResult<Snapshot>;
    async fn put(&self, watch_id: &str, item: &TrackedItem) -> StateResult<()>;
    async fn delete(&self, watch_id: &str, url: &str) -> StateResult<()>;
}

/// Delivers one outbound event per changed object.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn created(&self, url: &str) -> NotifyResult<()>;
    async fn updated(&self, url: &str) -> NotifyResult<()>;
    async fn deleted(&self, url: &str) -> NotifyResult<()>;
}

/// Publishes a message to a topic, returning the server-assigned message id.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> NotifyResult<String>;
}

/// Builds the notifier used for one watch's run.
pub trait NotifierFactory: Send + Sync {
    fn notifier_for(&self, watch: &WatchConfig) -> Arc<dyn Notifier>;
}

impl<F> NotifierFactory for F
where
    F: Fn(&WatchConfig) -> Arc<dyn Notifier> + Send + Sync,
{
    fn notifier_for(&self, watch: &WatchConfig) -> Arc<dyn Notifier> {
        self(watch)
    }
}
