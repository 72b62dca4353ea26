//! Assembles the daemon's components from configuration.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use bucketwatch_core::config::ListerBackend;
use bucketwatch_core::{DaemonConfig, WatchConfig};
use bucketwatch_gcs::{GcsLister, HttpPublisher, LocalDirLister};
use bucketwatch_reconcile::{
    LogNotifier, Notifier, NotifierFactory, NotifyResult, ObjectLister, OutboundMessage,
    Publisher, PubsubNotifierFactory, Reconciler, WatchScheduler,
};
use bucketwatch_state::StateStore;

/// Everything a serve or run invocation needs.
pub struct Components {
    pub store: StateStore,
    pub scheduler: WatchScheduler,
    pub publisher: Arc<dyn Publisher>,
}

/// Publisher used in dry-run mode: logs instead of sending.
struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> NotifyResult<String> {
        info!(%topic, attributes = ?message.attributes, "[dry-run] publish");
        Ok("dry-run".to_string())
    }
}

pub fn build_lister(config: &DaemonConfig) -> anyhow::Result<Arc<dyn ObjectLister>> {
    let storage = &config.storage;
    match storage.backend {
        ListerBackend::Gcs => {
            let lister = GcsLister::new(
                &storage.endpoint,
                storage.bearer_token.clone(),
                config.storage_timeout(),
                storage.page_size,
            )
            .context("building storage lister")?;
            info!(endpoint = %storage.endpoint, "using cloud storage lister");
            Ok(Arc::new(lister))
        }
        ListerBackend::Local => {
            let root = storage
                .local_root
                .clone()
                .context("storage.local_root is required for the local backend")?;
            info!(root = %root.display(), "using local directory lister");
            Ok(Arc::new(LocalDirLister::new(root)))
        }
    }
}

pub fn build_publisher(config: &DaemonConfig) -> anyhow::Result<Arc<dyn Publisher>> {
    let pubsub = &config.pubsub;
    if pubsub.dry_run {
        info!("dry run: messages are logged, not published");
        return Ok(Arc::new(DryRunPublisher));
    }
    let publisher = HttpPublisher::new(
        &pubsub.endpoint,
        pubsub.bearer_token.clone(),
        config.pubsub_timeout(),
    )
    .context("building pub/sub publisher")?;
    info!(endpoint = %pubsub.endpoint, "using pub/sub publisher");
    Ok(Arc::new(publisher))
}

pub fn build_notifiers(
    config: &DaemonConfig,
    publisher: Arc<dyn Publisher>,
) -> Arc<dyn NotifierFactory> {
    if config.pubsub.dry_run {
        return Arc::new(|watch: &WatchConfig| -> Arc<dyn Notifier> {
            Arc::new(LogNotifier::new(watch.topic.clone()))
        });
    }
    Arc::new(PubsubNotifierFactory::new(
        publisher,
        config.pubsub.publish_on.clone(),
    ))
}

/// Open the state store under the configured data dir and wire the
/// reconciler around it.
pub fn assemble(config: &DaemonConfig) -> anyhow::Result<Components> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!("creating data dir {}", config.server.data_dir.display())
    })?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)
        .with_context(|| format!("opening state store {}", db_path.display()))?;
    info!(path = ?db_path, "state store opened");

    let lister = build_lister(config)?;
    let publisher = build_publisher(config)?;
    let notifiers = build_notifiers(config, publisher.clone());

    let reconciler = Reconciler::new(lister, Arc::new(store.clone()), notifiers);
    let scheduler = WatchScheduler::new(store.clone(), reconciler, config.schedule_interval());

    Ok(Components {
        store,
        scheduler,
        publisher,
    })
}
