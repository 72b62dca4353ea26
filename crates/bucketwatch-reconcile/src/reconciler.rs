//! Reconciler — one change-detection run for one watch.
//!
//! A run:
//! 1. claims the watch in the [`RunGuard`]
//! 2. loads the stored snapshot (scoped by watch id)
//! 3. lists the bucket, keeping urls that match the watch pattern
//! 4. diffs stored against found
//! 5. persists each change, then notifies it
//!
//! Steps 2 and 3 abort the run on failure. In step 5 every item stands
//! alone: a failed write skips that item's notification, a failed
//! notification is only logged, and neither touches other items.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use bucketwatch_core::{
    ChangeKind, Snapshot, TrackedItem, WatchConfig, WatchId, compute_diff,
};

use crate::error::{ReconcileError, ReconcileResult};
use crate::guard::RunGuard;
use crate::ports::{Notifier, NotifierFactory, ObjectLister, SnapshotStore};

/// Outcome of one run. Counts only changes that were persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub watch_id: WatchId,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub persist_failures: usize,
    pub notify_failures: usize,
}

impl RunReport {
    fn new(watch_id: &str) -> Self {
        Self {
            watch_id: watch_id.to_string(),
            ..Self::default()
        }
    }

    /// True when every detected change was persisted and notified.
    pub fn is_clean(&self) -> bool {
        self.persist_failures == 0 && self.notify_failures == 0
    }
}

/// Runs change detection for watches.
#[derive(Clone)]
pub struct Reconciler {
    lister: Arc<dyn ObjectLister>,
    store: Arc<dyn SnapshotStore>,
    notifiers: Arc<dyn NotifierFactory>,
    guard: RunGuard,
}

impl Reconciler {
    pub fn new(
        lister: Arc<dyn ObjectLister>,
        store: Arc<dyn SnapshotStore>,
        notifiers: Arc<dyn NotifierFactory>,
    ) -> Self {
        Self {
            lister,
            store,
            notifiers,
            guard: RunGuard::new(),
        }
    }

    /// The guard tracking in-flight runs.
    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Run change detection for one watch.
    pub async fn run(&self, watch: &WatchConfig) -> ReconcileResult<RunReport> {
        let _permit = self
            .guard
            .try_acquire(&watch.id)
            .ok_or_else(|| ReconcileError::AlreadyRunning(watch.id.clone()))?;

        let pattern = watch.compiled_pattern()?;
        debug!(watch_id = %watch.id, bucket = %watch.bucket, "run starting");

        let stored = self
            .store
            .load_all(&watch.id)
            .await
            .map_err(|source| ReconcileError::Snapshot {
                watch_id: watch.id.clone(),
                source,
            })?;

        let listed = self
            .lister
            .list(&watch.bucket)
            .await
            .map_err(|source| ReconcileError::Listing {
                bucket: watch.bucket.clone(),
                source,
            })?;
        let listed_count = listed.len();
        let found: Snapshot = listed
            .into_iter()
            .filter(|o| pattern.is_match(&o.url))
            .map(|o| (o.url, o.updated))
            .collect();

        let diff = compute_diff(&stored, &found);
        debug!(
            watch_id = %watch.id,
            stored = stored.len(),
            listed = listed_count,
            matched = found.len(),
            created = diff.created.len(),
            updated = diff.updated.len(),
            deleted = diff.deleted.len(),
            "diff computed"
        );

        let notifier = self.notifiers.notifier_for(watch);
        let mut report = RunReport::new(&watch.id);
        report.unchanged = found.len() - diff.created.len() - diff.updated.len();

        for url in &diff.created {
            let item = TrackedItem {
                url: url.clone(),
                updated: found[url],
            };
            self.store_and_notify(&watch.id, ChangeKind::Created, item, notifier.as_ref(), &mut report)
                .await;
        }

        for url in &diff.updated {
            debug!(watch_id = %watch.id, %url, was = %stored[url], now = %found[url], "object updated");
            let item = TrackedItem {
                url: url.clone(),
                updated: found[url],
            };
            self.store_and_notify(&watch.id, ChangeKind::Updated, item, notifier.as_ref(), &mut report)
                .await;
        }

        for url in &diff.deleted {
            self.delete_and_notify(&watch.id, url, notifier.as_ref(), &mut report)
                .await;
        }

        if report.is_clean() {
            info!(
                watch_id = %watch.id,
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                unchanged = report.unchanged,
                "run complete"
            );
        } else {
            warn!(
                watch_id = %watch.id,
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                persist_failures = report.persist_failures,
                notify_failures = report.notify_failures,
                "run complete with item failures"
            );
        }
        Ok(report)
    }

    async fn store_and_notify(
        &self,
        watch_id: &str,
        kind: ChangeKind,
        item: TrackedItem,
        notifier: &dyn Notifier,
        report: &mut RunReport,
    ) {
        if let Err(e) = self.store.put(watch_id, &item).await {
            error!(%watch_id, url = %item.url, %kind, error = %e, "failed to store tracked item");
            report.persist_failures += 1;
            return;
        }

        let notified = match kind {
            ChangeKind::Created => {
                report.created += 1;
                notifier.created(&item.url).await
            }
            _ => {
                report.updated += 1;
                notifier.updated(&item.url).await
            }
        };
        if let Err(e) = notified {
            warn!(%watch_id, url = %item.url, %kind, error = %e, "notification failed");
            report.notify_failures += 1;
        }
    }

    async fn delete_and_notify(
        &self,
        watch_id: &str,
        url: &str,
        notifier: &dyn Notifier,
        report: &mut RunReport,
    ) {
        if let Err(e) = self.store.delete(watch_id, url).await {
            error!(%watch_id, %url, error = %e, "failed to delete tracked item");
            report.persist_failures += 1;
            return;
        }

        report.deleted += 1;
        if let Err(e) = notifier.deleted(url).await {
            warn!(%watch_id, %url, error = %e, "notification failed");
            report.notify_failures += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use bucketwatch_core::{ListedObject, WatchDraft};

    const FOO: &str = "gs://bucket1/path/to/foo.txt";
    const BAR: &str = "gs://bucket1/path/to/bar.txt";
    const BAZ: &str = "gs://bucket1/path/to/baz.txt";

    struct Harness {
        lister: Arc<FakeLister>,
        store: Arc<FlakyStore>,
        notifier: Arc<RecordingNotifier>,
        reconciler: Reconciler,
    }

    fn harness(objects: Vec<ListedObject>) -> Harness {
        let lister = Arc::new(FakeLister::with(objects));
        let store = Arc::new(FlakyStore::new());
        // Runs below address these as watch-1 and watch-2.
        for _ in 0..2 {
            store.inner.create_watch(&draft()).unwrap();
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let shared = notifier.clone();
        let factory = move |_: &WatchConfig| -> Arc<dyn Notifier> { shared.clone() };
        let reconciler = Reconciler::new(lister.clone(), store.clone(), Arc::new(factory));
        Harness {
            lister,
            store,
            notifier,
            reconciler,
        }
    }

    fn draft() -> WatchDraft {
        WatchDraft {
            seq: None,
            bucket: "bucket1".to_string(),
            pattern: ".*".to_string(),
            topic: "projects/p/topics/t".to_string(),
        }
    }

    fn watch(id: &str, pattern: &str) -> WatchConfig {
        WatchConfig {
            id: id.to_string(),
            seq: 1,
            bucket: "bucket1".to_string(),
            pattern: pattern.to_string(),
            topic: "projects/p/topics/t".to_string(),
        }
    }

    fn strings(urls: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        v.sort();
        v
    }

    #[tokio::test]
    async fn first_run_creates_everything() {
        let h = harness(vec![listed(FOO, 100), listed(BAR, 200)]);
        let w = watch("watch-1", ".*");

        let report = h.reconciler.run(&w).await.unwrap();
        assert_eq!(report.created, 2);
        assert!(report.is_clean());
        assert_eq!(h.notifier.urls(ChangeKind::Created), strings(&[FOO, BAR]));
        assert_eq!(h.store.inner.load_snapshot("watch-1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn created_updated_deleted_across_runs() {
        let h = harness(vec![listed(FOO, 100), listed(BAR, 200)]);
        let w = watch("watch-1", ".*");
        h.reconciler.run(&w).await.unwrap();
        h.notifier.clear();

        h.lister
            .set(vec![listed(FOO, 100), listed(BAR, 300), listed(BAZ, 400)]);
        let report = h.reconciler.run(&w).await.unwrap();
        assert_eq!((report.created, report.updated, report.deleted), (1, 1, 0));
        assert_eq!(report.unchanged, 1);
        assert_eq!(h.notifier.urls(ChangeKind::Created), strings(&[BAZ]));
        assert_eq!(h.notifier.urls(ChangeKind::Updated), strings(&[BAR]));
        assert_eq!(h.store.inner.load_snapshot("watch-1").unwrap()[BAR], ts(300));
        h.notifier.clear();

        h.lister.set(vec![listed(FOO, 100)]);
        let report = h.reconciler.run(&w).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(h.notifier.urls(ChangeKind::Deleted), strings(&[BAR, BAZ]));
        assert_eq!(h.store.inner.load_snapshot("watch-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stable_bucket_produces_no_notifications() {
        let h = harness(vec![listed(FOO, 100)]);
        let w = watch("watch-1", ".*");
        h.reconciler.run(&w).await.unwrap();
        h.notifier.clear();

        let report = h.reconciler.run(&w).await.unwrap();
        assert_eq!(report.created + report.updated + report.deleted, 0);
        assert_eq!(report.unchanged, 1);
        assert!(h.notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_skips_only_that_item() {
        let h = harness(vec![listed(FOO, 100), listed(BAR, 200)]);
        h.store.fail_writes_for(FOO);

        let report = h.reconciler.run(&watch("watch-1", ".*")).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.persist_failures, 1);
        assert_eq!(h.notifier.urls(ChangeKind::Created), strings(&[BAR]));

        let snapshot = h.store.inner.load_snapshot("watch-1").unwrap();
        assert!(!snapshot.contains_key(FOO));
        assert!(snapshot.contains_key(BAR));
    }

    #[tokio::test]
    async fn failed_delete_keeps_item_for_next_run() {
        let h = harness(vec![listed(FOO, 100), listed(BAR, 200)]);
        let w = watch("watch-1", ".*");
        h.reconciler.run(&w).await.unwrap();
        h.notifier.clear();

        h.lister.set(vec![]);
        h.store.fail_writes_for(FOO);
        let report = h.reconciler.run(&w).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.persist_failures, 1);
        assert_eq!(h.notifier.urls(ChangeKind::Deleted), strings(&[BAR]));
        assert!(h.store.inner.load_snapshot("watch-1").unwrap().contains_key(FOO));
    }

    #[tokio::test]
    async fn notification_failure_does_not_roll_back_or_cascade() {
        let h = harness(vec![listed(FOO, 100), listed(BAR, 200)]);
        h.notifier.fail_for(FOO);

        let report = h.reconciler.run(&watch("watch-1", ".*")).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.notify_failures, 1);
        assert!(!report.is_clean());
        assert_eq!(h.notifier.urls(ChangeKind::Created), strings(&[FOO, BAR]));
        assert_eq!(h.store.inner.load_snapshot("watch-1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listing_failure_aborts_without_changes() {
        let h = harness(vec![listed(FOO, 100)]);
        h.lister.fail();

        let err = h.reconciler.run(&watch("watch-1", ".*")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Listing { .. }));
        assert!(h.notifier.events.lock().unwrap().is_empty());
        assert!(h.store.inner.load_snapshot("watch-1").unwrap().is_empty());
        assert!(!h.reconciler.guard().is_running("watch-1"));
    }

    #[tokio::test]
    async fn snapshot_failure_aborts() {
        let h = harness(vec![listed(FOO, 100)]);
        h.store.fail_load();

        let err = h.reconciler.run(&watch("watch-1", ".*")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Snapshot { .. }));
        assert!(h.notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pattern_limits_what_is_tracked() {
        let h = harness(vec![
            listed("gs://bucket1/dir1/a.yml", 1),
            listed("gs://bucket1/dir2/b.yml", 1),
        ]);
        let report = h
            .reconciler
            .run(&watch("watch-1", r"\Ags://bucket1/dir1/"))
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(
            h.notifier.urls(ChangeKind::Created),
            strings(&["gs://bucket1/dir1/a.yml"])
        );
    }

    #[tokio::test]
    async fn invalid_pattern_aborts_run() {
        let h = harness(vec![listed(FOO, 1)]);
        let err = h.reconciler.run(&watch("watch-1", "(")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[tokio::test]
    async fn watches_have_independent_snapshots() {
        let h = harness(vec![listed(FOO, 100)]);
        h.reconciler.run(&watch("watch-1", ".*")).await.unwrap();

        let report = h.reconciler.run(&watch("watch-2", ".*")).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(h.store.inner.load_snapshot("watch-1").unwrap().len(), 1);
        assert_eq!(h.store.inner.load_snapshot("watch-2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_run_for_same_watch_is_rejected() {
        let h = harness(vec![listed(FOO, 100)]);
        let _held = h.reconciler.guard().try_acquire("watch-1").unwrap();

        let err = h.reconciler.run(&watch("watch-1", ".*")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::AlreadyRunning(id) if id == "watch-1"));
        assert!(h.reconciler.run(&watch("watch-2", ".*")).await.is_ok());
    }

    #[tokio::test]
    async fn run_for_deleted_watch_tracks_nothing() {
        let h = harness(vec![listed(FOO, 100)]);
        let stale = h.store.inner.find_watch("watch-1").unwrap();
        h.store.inner.delete_watch("watch-1").unwrap();

        let report = h.reconciler.run(&stale).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.persist_failures, 1);
        assert!(h.notifier.events.lock().unwrap().is_empty());
        assert!(h.store.inner.list_items("watch-1").unwrap().is_empty());
    }
}
