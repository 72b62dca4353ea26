//! State wiring shared by the handler tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use serde::de::DeserializeOwned;

use bucketwatch_core::ChangeKind;
use bucketwatch_reconcile::testing::{FakeLister, RecordingPublisher};
use bucketwatch_reconcile::{PubsubNotifierFactory, Reconciler, WatchScheduler};
use bucketwatch_state::StateStore;

use crate::ApiState;

pub use bucketwatch_reconcile::testing::listed;

pub const TOPIC: &str = "projects/p/topics/t";

pub fn test_state() -> (ApiState, Arc<FakeLister>, Arc<RecordingPublisher>) {
    let store = StateStore::open_in_memory().unwrap();
    let lister = Arc::new(FakeLister::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let publish_on: BTreeSet<ChangeKind> = [ChangeKind::Created, ChangeKind::Updated].into();

    let factory = PubsubNotifierFactory::new(publisher.clone(), publish_on.clone());
    let reconciler = Reconciler::new(lister.clone(), Arc::new(store.clone()), Arc::new(factory));
    let scheduler = WatchScheduler::new(store.clone(), reconciler, Duration::from_secs(60));

    let state = ApiState {
        store,
        scheduler,
        publisher: publisher.clone(),
        publish_on,
    };
    (state, lister, publisher)
}

/// Decode the `data` field of an API envelope.
pub async fn body_data<T: DeserializeOwned>(resp: Response) -> T {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let mut envelope: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    serde_json::from_value(envelope["data"].take()).unwrap()
}
