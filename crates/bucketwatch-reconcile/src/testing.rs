//! Fakes for the reconciler's edge traits.
//!
//! Compiled for this crate's tests and, behind the `testing` feature, for
//! the tests of crates built on top of it.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use bucketwatch_core::{ChangeKind, ListedObject, Snapshot, Timestamp, TrackedItem};
use bucketwatch_state::{StateError, StateResult, StateStore};

use crate::error::{ListError, ListResult, NotifyError, NotifyResult};
use crate::notify::{DOWNLOAD_FILES_ATTR, OutboundMessage};
use crate::ports::{Notifier, ObjectLister, Publisher, SnapshotStore};

pub fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn listed(url: &str, secs: i64) -> ListedObject {
    ListedObject {
        url: url.to_string(),
        updated: ts(secs),
    }
}

/// Lister returning a fixed, replaceable listing.
#[derive(Default)]
pub struct FakeLister {
    objects: Mutex<Vec<ListedObject>>,
    fail: Mutex<bool>,
    stall: Mutex<bool>,
}

impl FakeLister {
    pub fn with(objects: Vec<ListedObject>) -> Self {
        Self {
            objects: Mutex::new(objects),
            ..Self::default()
        }
    }

    pub fn set(&self, objects: Vec<ListedObject>) {
        *self.objects.lock().unwrap() = objects;
    }

    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Make every later listing hang forever.
    pub fn stall(&self) {
        *self.stall.lock().unwrap() = true;
    }
}

#[async_trait]
impl ObjectLister for FakeLister {
    async fn list(&self, _bucket: &str) -> ListResult<Vec<ListedObject>> {
        let stalled = *self.stall.lock().unwrap();
        if stalled {
            std::future::pending::<()>().await;
        }
        if *self.fail.lock().unwrap() {
            return Err(ListError::Transport("connection refused".to_string()));
        }
        Ok(self.objects.lock().unwrap().clone())
    }
}

/// Snapshot store over a real in-memory `StateStore` with failure injection.
pub struct FlakyStore {
    pub inner: StateStore,
    fail_writes: Mutex<HashSet<String>>,
    fail_load: Mutex<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: StateStore::open_in_memory().unwrap(),
            fail_writes: Mutex::new(HashSet::new()),
            fail_load: Mutex::new(false),
        }
    }

    pub fn fail_writes_for(&self, url: &str) {
        self.fail_writes.lock().unwrap().insert(url.to_string());
    }

    pub fn fail_load(&self) {
        *self.fail_load.lock().unwrap() = true;
    }

    fn check(&self, url: &str) -> StateResult<()> {
        if self.fail_writes.lock().unwrap().contains(url) {
            return Err(StateError::Write(format!("injected failure for {url}")));
        }
        Ok(())
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn load_all(&self, watch_id: &str) -> StateResult<Snapshot> {
        if *self.fail_load.lock().unwrap() {
            return Err(StateError::Read("injected load failure".to_string()));
        }
        self.inner.load_snapshot(watch_id)
    }

    async fn put(&self, watch_id: &str, item: &TrackedItem) -> StateResult<()> {
        self.check(&item.url)?;
        self.inner.put_item(watch_id, item)
    }

    async fn delete(&self, watch_id: &str, url: &str) -> StateResult<()> {
        self.check(url)?;
        self.inner.delete_item(watch_id, url).map(|_| ())
    }
}

/// Notifier recording every call, optionally failing for some urls.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(ChangeKind, String)>>,
    fail_for: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn fail_for(&self, url: &str) {
        self.fail_for.lock().unwrap().insert(url.to_string());
    }

    pub fn urls(&self, kind: ChangeKind) -> Vec<String> {
        let mut urls: Vec<String> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, u)| u.clone())
            .collect();
        urls.sort();
        urls
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn record(&self, kind: ChangeKind, url: &str) -> NotifyResult<()> {
        self.events.lock().unwrap().push((kind, url.to_string()));
        if self.fail_for.lock().unwrap().contains(url) {
            return Err(NotifyError::Transport("injected notify failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn created(&self, url: &str) -> NotifyResult<()> {
        self.record(ChangeKind::Created, url)
    }

    async fn updated(&self, url: &str) -> NotifyResult<()> {
        self.record(ChangeKind::Updated, url)
    }

    async fn deleted(&self, url: &str) -> NotifyResult<()> {
        self.record(ChangeKind::Deleted, url)
    }
}

/// Publisher recording `(topic, message)` pairs.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, OutboundMessage)>>,
    fail: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn topics(&self) -> Vec<String> {
        self.published.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    /// The `download_files` attribute of every message, in publish order.
    pub fn urls(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.attributes[DOWNLOAD_FILES_ATTR].clone())
            .collect()
    }

    /// Drain recorded `(topic, download url)` pairs.
    pub fn take(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.published.lock().unwrap())
            .into_iter()
            .map(|(topic, m)| (topic, m.attributes[DOWNLOAD_FILES_ATTR].clone()))
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> NotifyResult<String> {
        if *self.fail.lock().unwrap() {
            return Err(NotifyError::Rejected {
                topic: topic.to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let mut published = self.published.lock().unwrap();
        published.push((topic.to_string(), message.clone()));
        Ok(format!("msg-{}", published.len()))
    }
}
