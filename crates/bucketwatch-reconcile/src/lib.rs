//! bucketwatch-reconcile — change detection runs for bucket watches.
//!
//! A run loads the stored snapshot of a watch, lists the bucket, diffs the
//! two, persists each change, and notifies each persisted change. Failures
//! of a single item are logged and counted; only setup failures (snapshot
//! load, bucket listing) abort a run.
//!
//! # Architecture
//!
//! ```text
//! WatchScheduler
//!   ├── StateStore (list watches)
//!   ├── run() → periodic loop, one task per watch
//!   └── Reconciler
//!       ├── RunGuard (one in-flight run per watch id)
//!       ├── SnapshotStore (load / put / delete tracked items)
//!       ├── ObjectLister (enumerate bucket)
//!       ├── compute_diff() (bucketwatch-core)
//!       └── NotifierFactory → Notifier (created / updated / deleted)
//!
//! Notifiers
//!   ├── PubsubNotifier       → fixed topic via Publisher
//!   ├── TopicRoutingNotifier → first matching watch's topic via Publisher
//!   └── LogNotifier          → tracing only
//! ```

pub mod error;
pub mod guard;
pub mod notify;
pub mod ports;
pub mod reconciler;
pub mod scheduler;
pub mod snapshot;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ListError, ListResult, NotifyError, NotifyResult, ReconcileError, ReconcileResult};
pub use guard::{RunGuard, RunPermit};
pub use notify::{
    LogNotifier, OutboundMessage, PubsubNotifier, PubsubNotifierFactory, TopicRoutingNotifier,
    DOWNLOAD_FILES_ATTR,
};
pub use ports::{Notifier, NotifierFactory, ObjectLister, Publisher, SnapshotStore};
pub use reconciler::{Reconciler, RunReport};
pub use scheduler::WatchScheduler;
