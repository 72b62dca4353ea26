//! Object-change notification proxy.
//!
//! Cloud Storage posts one request per object change, tagged with the
//! `X-Goog-Resource-State` header. Each change is routed to the topic of the
//! first watch whose pattern matches the object url.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use bucketwatch_core::{TopicRouter, url::object_url};
use bucketwatch_reconcile::{Notifier, TopicRoutingNotifier};

use crate::ApiState;

pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";

/// What a notification asks for, decided from its resource state header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceState {
    /// No header: not a change notification.
    Unknown,
    /// Channel handshake sent when a notification channel is created.
    Sync,
    Exists,
    NotExists,
}

impl ResourceState {
    fn from_headers(headers: &HeaderMap) -> Result<Self, String> {
        let Some(value) = headers.get(RESOURCE_STATE_HEADER) else {
            return Ok(Self::Unknown);
        };
        match value.to_str() {
            Ok("") => Ok(Self::Unknown),
            Ok("sync") => Ok(Self::Sync),
            Ok("exists") => Ok(Self::Exists),
            Ok("not_exists") => Ok(Self::NotExists),
            Ok(other) => Err(format!("unsupported resource state: {other}")),
            Err(_) => Err("unsupported resource state".to_string()),
        }
    }
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, msg.into()).into_response()
}

/// Extract the object url from a notification body.
fn object_url_from_body(body: &[u8]) -> Result<String, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON body: {e}"))?;
    let bucket = value
        .get("bucket")
        .and_then(Value::as_str)
        .ok_or("bucket must be a string")?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or("name must be a string")?;
    Ok(object_url(bucket, name))
}

/// POST /notifications
pub async fn receive(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let resource_state = match ResourceState::from_headers(&headers) {
        Ok(s) => s,
        Err(msg) => {
            warn!(%msg, "rejecting notification");
            return bad_request(msg);
        }
    };

    match resource_state {
        ResourceState::Unknown => {
            info!("notification without resource state ignored");
            return (StatusCode::OK, "OK").into_response();
        }
        ResourceState::Sync => {
            info!("sync notification received");
            return (StatusCode::OK, "OK").into_response();
        }
        ResourceState::Exists | ResourceState::NotExists => {}
    }

    let url = match object_url_from_body(&body) {
        Ok(url) => url,
        Err(msg) => {
            warn!(%msg, "rejecting notification");
            return bad_request(msg);
        }
    };

    let router = match state
        .store
        .list_watches()
        .map_err(|e| e.to_string())
        .and_then(|watches| TopicRouter::from_watches(&watches).map_err(|e| e.to_string()))
    {
        Ok(router) => router,
        Err(e) => {
            warn!(error = %e, "cannot build topic router");
            return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response();
        }
    };
    debug!(%url, ?resource_state, watches = router.len(), "routing notification");

    let notifier = TopicRoutingNotifier::new(state.publisher.clone(), router)
        .with_publish_on(state.publish_on.clone());
    let result = match resource_state {
        ResourceState::Exists => notifier.updated(&url).await,
        _ => notifier.deleted(&url).await,
    };

    match result {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}
