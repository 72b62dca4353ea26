//! Notifier implementations.
//!
//! Messages follow the download contract: an attribute map with
//! `download_files` set to the changed object's url and no body. Which change
//! kinds produce a message is configurable; by default only creations and
//! updates are announced, since a deleted object cannot be downloaded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use bucketwatch_core::{ChangeKind, TopicRouter, WatchConfig};

use crate::error::NotifyResult;
use crate::ports::{Notifier, NotifierFactory, Publisher};

/// Attribute carrying the affected object url.
pub const DOWNLOAD_FILES_ATTR: &str = "download_files";

/// An attribute-only Pub/Sub message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub attributes: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Message asking subscribers to download `url`.
    pub fn download(url: &str) -> Self {
        Self {
            attributes: BTreeMap::from([(DOWNLOAD_FILES_ATTR.to_string(), url.to_string())]),
        }
    }
}

fn default_publish_on() -> BTreeSet<ChangeKind> {
    [ChangeKind::Created, ChangeKind::Updated].into()
}

async fn publish_download(
    publisher: &dyn Publisher,
    topic: &str,
    kind: ChangeKind,
    url: &str,
) -> NotifyResult<()> {
    let message = OutboundMessage::download(url);
    match publisher.publish(topic, &message).await {
        Ok(message_id) => {
            info!(%url, %topic, %kind, %message_id, "change published");
            Ok(())
        }
        Err(e) => {
            error!(%url, %topic, %kind, error = %e, "failed to publish change");
            Err(e)
        }
    }
}

// ── Fixed topic ────────────────────────────────────────────────

/// Publishes every enabled change to one topic (a watch's destination).
pub struct PubsubNotifier {
    publisher: Arc<dyn Publisher>,
    topic: String,
    publish_on: BTreeSet<ChangeKind>,
}

impl PubsubNotifier {
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            publish_on: default_publish_on(),
        }
    }

    pub fn with_publish_on(mut self, publish_on: BTreeSet<ChangeKind>) -> Self {
        self.publish_on = publish_on;
        self
    }

    async fn notify(&self, kind: ChangeKind, url: &str) -> NotifyResult<()> {
        if !self.publish_on.contains(&kind) {
            debug!(%url, %kind, topic = %self.topic, "change kind not published");
            return Ok(());
        }
        publish_download(self.publisher.as_ref(), &self.topic, kind, url).await
    }
}

#[async_trait]
impl Notifier for PubsubNotifier {
    async fn created(&self, url: &str) -> NotifyResult<()> {
        self.notify(ChangeKind::Created, url).await
    }

    async fn updated(&self, url: &str) -> NotifyResult<()> {
        self.notify(ChangeKind::Updated, url).await
    }

    async fn deleted(&self, url: &str) -> NotifyResult<()> {
        self.notify(ChangeKind::Deleted, url).await
    }
}

/// Builds a [`PubsubNotifier`] bound to each watch's destination topic.
#[derive(Clone)]
pub struct PubsubNotifierFactory {
    publisher: Arc<dyn Publisher>,
    publish_on: BTreeSet<ChangeKind>,
}

impl PubsubNotifierFactory {
    pub fn new(publisher: Arc<dyn Publisher>, publish_on: BTreeSet<ChangeKind>) -> Self {
        Self {
            publisher,
            publish_on,
        }
    }
}

impl NotifierFactory for PubsubNotifierFactory {
    fn notifier_for(&self, watch: &WatchConfig) -> Arc<dyn Notifier> {
        Arc::new(
            PubsubNotifier::new(Arc::clone(&self.publisher), watch.topic.clone())
                .with_publish_on(self.publish_on.clone()),
        )
    }
}

// ── Routed topic ───────────────────────────────────────────────

/// Resolves the destination topic per url before publishing.
///
/// Used for proxied object-change notifications, where the url arrives
/// without a watch attached. A url no watch matches is dropped.
pub struct TopicRoutingNotifier {
    publisher: Arc<dyn Publisher>,
    router: TopicRouter,
    publish_on: BTreeSet<ChangeKind>,
}

impl TopicRoutingNotifier {
    pub fn new(publisher: Arc<dyn Publisher>, router: TopicRouter) -> Self {
        Self {
            publisher,
            router,
            publish_on: default_publish_on(),
        }
    }

    pub fn with_publish_on(mut self, publish_on: BTreeSet<ChangeKind>) -> Self {
        self.publish_on = publish_on;
        self
    }

    async fn notify(&self, kind: ChangeKind, url: &str) -> NotifyResult<()> {
        if !self.publish_on.contains(&kind) {
            debug!(%url, %kind, "change kind not published");
            return Ok(());
        }
        let Some(topic) = self.router.resolve(url) else {
            debug!(%url, %kind, "no topic for url, dropping notification");
            return Ok(());
        };
        publish_download(self.publisher.as_ref(), topic, kind, url).await
    }
}

#[async_trait]
impl Notifier for TopicRoutingNotifier {
    async fn created(&self, url: &str) -> NotifyResult<()> {
        self.notify(ChangeKind::Created, url).await
    }

    async fn updated(&self, url: &str) -> NotifyResult<()> {
        self.notify(ChangeKind::Updated, url).await
    }

    async fn deleted(&self, url: &str) -> NotifyResult<()> {
        self.notify(ChangeKind::Deleted, url).await
    }
}

// ── Dry run ────────────────────────────────────────────────────

/// Logs changes instead of publishing them.
pub struct LogNotifier {
    topic: String,
}

impl LogNotifier {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn created(&self, url: &str) -> NotifyResult<()> {
        info!(%url, topic = %self.topic, "[dry-run] created");
        Ok(())
    }

    async fn updated(&self, url: &str) -> NotifyResult<()> {
        info!(%url, topic = %self.topic, "[dry-run] updated");
        Ok(())
    }

    async fn deleted(&self, url: &str) -> NotifyResult<()> {
        info!(%url, topic = %self.topic, "[dry-run] deleted");
        Ok(())
    }
}
