//! REST API handlers for watches.
//!
//! Each handler reads/writes via `StateStore` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use bucketwatch_core::WatchDraft;
use bucketwatch_reconcile::ReconcileError;
use bucketwatch_state::StateError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn state_error_status(e: &StateError) -> StatusCode {
    match e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn state_error_response(e: StateError) -> Response {
    error_response(&e.to_string(), state_error_status(&e))
}

fn reconcile_error_status(e: &ReconcileError) -> StatusCode {
    match e {
        ReconcileError::AlreadyRunning(_) => StatusCode::CONFLICT,
        ReconcileError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReconcileError::Listing { .. } | ReconcileError::Snapshot { .. } => StatusCode::BAD_GATEWAY,
        ReconcileError::State(e) => state_error_status(e),
    }
}

// ── Watches ────────────────────────────────────────────────────

/// GET /api/v1/watches
pub async fn list_watches(State(state): State<ApiState>) -> Response {
    match state.store.list_watches() {
        Ok(watches) => ApiResponse::ok(watches).into_response(),
        Err(e) => state_error_response(e),
    }
}

/// GET /api/v1/watches/{id}
pub async fn get_watch(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.get_watch(&id) {
        Ok(Some(watch)) => ApiResponse::ok(watch).into_response(),
        Ok(None) => error_response("watch not found", StatusCode::NOT_FOUND),
        Err(e) => state_error_response(e),
    }
}

/// POST /api/v1/watches
pub async fn create_watch(
    State(state): State<ApiState>,
    Json(draft): Json<WatchDraft>,
) -> Response {
    match state.store.create_watch(&draft) {
        Ok(watch) => {
            info!(watch_id = %watch.id, seq = watch.seq, bucket = %watch.bucket, "watch created");
            (StatusCode::CREATED, ApiResponse::ok(watch)).into_response()
        }
        Err(e) => state_error_response(e),
    }
}

/// PUT /api/v1/watches/{id}
pub async fn update_watch(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(draft): Json<WatchDraft>,
) -> Response {
    match state.store.update_watch(&id, &draft) {
        Ok(watch) => {
            info!(watch_id = %watch.id, seq = watch.seq, "watch updated");
            ApiResponse::ok(watch).into_response()
        }
        Err(e) => state_error_response(e),
    }
}

/// DELETE /api/v1/watches/{id}
pub async fn delete_watch(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.delete_watch(&id) {
        Ok(items_removed) => {
            info!(watch_id = %id, items_removed, "watch deleted");
            ApiResponse::ok(serde_json::json!({
                "watch": id,
                "items_removed": items_removed,
            }))
            .into_response()
        }
        Err(e) => state_error_response(e),
    }
}

// ── Runs ───────────────────────────────────────────────────────

/// POST /api/v1/watches/{id}/run
pub async fn run_watch(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.scheduler.run_watch(&id).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => {
            let status = reconcile_error_status(&e);
            if status.is_server_error() {
                warn!(watch_id = %id, error = %e, "triggered run failed");
            }
            error_response(&e.to_string(), status)
        }
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    use bucketwatch_core::WatchConfig;

    fn draft(pattern: &str, topic: &str) -> WatchDraft {
        WatchDraft {
            seq: None,
            bucket: "bucket1".to_string(),
            pattern: pattern.to_string(),
            topic: topic.to_string(),
        }
    }

    #[tokio::test]
    async fn list_watches_empty() {
        let (state, _, _) = test_state();
        let resp = list_watches(State(state)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_and_get_watch() {
        let (state, _, _) = test_state();

        let resp = create_watch(State(state.clone()), Json(draft(".*", TOPIC))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let watch: WatchConfig = body_data(resp).await;
        assert_eq!(watch.seq, 1);

        let resp = get_watch(State(state), Path(watch.id)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_rejects_invalid_rules() {
        let (state, _, _) = test_state();

        let resp = create_watch(State(state.clone()), Json(draft("[", TOPIC))).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = create_watch(State(state.clone()), Json(draft(".*", "topics/t"))).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert!(state.store.list_watches().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_nonexistent_watch() {
        let (state, _, _) = test_state();
        let resp = get_watch(State(state), Path("watch-404".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_and_delete_watch() {
        let (state, _, _) = test_state();
        let watch = state.store.create_watch(&draft(".*", TOPIC)).unwrap();

        let resp = update_watch(
            State(state.clone()),
            Path(watch.id.clone()),
            Json(draft(r"\.csv\z", TOPIC)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.store.find_watch(&watch.id).unwrap().pattern, r"\.csv\z");

        let resp = delete_watch(State(state.clone()), Path(watch.id.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = delete_watch(State(state), Path(watch.id)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_watch_reports_changes() {
        let (state, lister, publisher) = test_state();
        let watch = state.store.create_watch(&draft(".*", TOPIC)).unwrap();
        lister.set(vec![listed("gs://bucket1/a.txt", 10)]);

        let resp = run_watch(State(state.clone()), Path(watch.id.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let report: serde_json::Value = body_data(resp).await;
        assert_eq!(report["created"], 1);
        assert_eq!(publisher.topics(), vec![TOPIC.to_string()]);

        // Nothing changed since.
        let resp = run_watch(State(state), Path(watch.id)).await;
        let report: serde_json::Value = body_data(resp).await;
        assert_eq!(report["created"], 0);
        assert_eq!(report["unchanged"], 1);
    }

    #[tokio::test]
    async fn run_watch_maps_errors() {
        let (state, lister, _) = test_state();

        let resp = run_watch(State(state.clone()), Path("watch-404".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let watch = state.store.create_watch(&draft(".*", TOPIC)).unwrap();
        lister.fail();
        let resp = run_watch(State(state.clone()), Path(watch.id.clone())).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let _permit = state.scheduler.reconciler().guard().try_acquire(&watch.id).unwrap();
        let resp = run_watch(State(state), Path(watch.id)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            state_error_status(&StateError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            state_error_status(&StateError::Write("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            reconcile_error_status(&ReconcileError::AlreadyRunning("w".into())),
            StatusCode::CONFLICT
        );
    }
}
