//! bucketwatch-api — REST API for bucketwatch.
//!
//! Provides axum route handlers for managing watches, triggering runs, and
//! proxying object-change notifications to Pub/Sub.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/watches` | List all watches |
//! | POST | `/api/v1/watches` | Create a watch |
//! | GET | `/api/v1/watches/{id}` | Get a watch |
//! | PUT | `/api/v1/watches/{id}` | Replace a watch's rule |
//! | DELETE | `/api/v1/watches/{id}` | Delete a watch and its snapshot |
//! | POST | `/api/v1/watches/{id}/run` | Run change detection now |
//! | POST | `/notifications` | Object-change notification proxy |
//! | GET | `/healthz` | Liveness |

pub mod handlers;
pub mod notifications;

#[cfg(test)]
mod testing;

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use bucketwatch_core::ChangeKind;
use bucketwatch_reconcile::{Publisher, WatchScheduler};
use bucketwatch_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub scheduler: WatchScheduler,
    /// Publisher used by the notification proxy.
    pub publisher: Arc<dyn Publisher>,
    pub publish_on: BTreeSet<ChangeKind>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/watches",
            get(handlers::list_watches).post(handlers::create_watch),
        )
        .route(
            "/watches/{id}",
            get(handlers::get_watch)
                .put(handlers::update_watch)
                .delete(handlers::delete_watch),
        )
        .route("/watches/{id}/run", post(handlers::run_watch));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/notifications", post(notifications::receive))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
