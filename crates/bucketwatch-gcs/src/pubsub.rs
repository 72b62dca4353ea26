//! Pub/Sub REST publisher.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bucketwatch_reconcile::{NotifyError, NotifyResult, OutboundMessage, Publisher};

use crate::client::{HttpClient, HttpError};

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    messages: Vec<PubsubMessage<'a>>,
}

/// Attribute-only message; `data` is never sent.
#[derive(Debug, Serialize)]
struct PubsubMessage<'a> {
    attributes: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes messages with `POST {endpoint}/v1/{topic}:publish`.
pub struct HttpPublisher {
    client: HttpClient,
}

impl HttpPublisher {
    pub fn new(
        endpoint: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            client: HttpClient::new(endpoint, bearer_token, timeout)?,
        })
    }
}

/// Path segments of the publish call for `projects/{p}/topics/{t}`.
fn publish_segments(topic: &str) -> Vec<String> {
    let mut segments: Vec<String> = std::iter::once("v1")
        .chain(topic.split('/'))
        .map(str::to_string)
        .collect();
    if let Some(last) = segments.last_mut() {
        last.push_str(":publish");
    }
    segments
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> NotifyResult<String> {
        let segments = publish_segments(topic);
        let url = self.client.url(segments.iter().map(String::as_str));

        let request = PublishRequest {
            messages: vec![PubsubMessage {
                attributes: &message.attributes,
            }],
        };
        let resp = self.client.post_json(&url, &request).await?;
        if !resp.status.is_success() {
            return Err(NotifyError::Rejected {
                topic: topic.to_string(),
                status: resp.status.as_u16(),
                body: resp.body_text(),
            });
        }

        let parsed: PublishResponse =
            serde_json::from_slice(&resp.body).map_err(|e| NotifyError::Decode(e.to_string()))?;
        parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| NotifyError::Decode("publish response carried no message ids".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    type Received = Arc<Mutex<Vec<(String, Value)>>>;

    async fn publish(
        State(received): State<Received>,
        Path(path): Path<String>,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        if path.ends_with("topics/missing:publish") {
            return (StatusCode::NOT_FOUND, "topic not found").into_response();
        }
        received.lock().unwrap().push((path, body));
        Json(json!({"messageIds": ["42"]})).into_response()
    }

    async fn serve_fake_pubsub() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/v1/{*path}", post(publish))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    #[test]
    fn publish_path_appends_verb_to_topic() {
        assert_eq!(
            publish_segments("projects/p/topics/t"),
            vec!["v1", "projects", "p", "topics", "t:publish"]
        );
    }

    #[tokio::test]
    async fn publishes_attribute_only_message() {
        let (endpoint, received) = serve_fake_pubsub().await;
        let publisher = HttpPublisher::new(&endpoint, None, Duration::from_secs(5)).unwrap();

        let id = publisher
            .publish(
                "projects/p/topics/t",
                &OutboundMessage::download("gs://bucket1/path/to/foo.txt"),
            )
            .await
            .unwrap();
        assert_eq!(id, "42");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "projects/p/topics/t:publish");
        assert_eq!(
            received[0].1,
            json!({"messages": [{"attributes": {"download_files": "gs://bucket1/path/to/foo.txt"}}]})
        );
    }

    #[tokio::test]
    async fn rejected_publish_carries_status() {
        let (endpoint, _) = serve_fake_pubsub().await;
        let publisher = HttpPublisher::new(&endpoint, None, Duration::from_secs(5)).unwrap();

        let err = publisher
            .publish("projects/p/topics/missing", &OutboundMessage::download("gs://b/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 404, .. }), "{err}");
    }
}
