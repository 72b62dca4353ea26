//! Cloud Storage JSON API lister.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use bucketwatch_core::{ListedObject, url::object_url};
use bucketwatch_reconcile::{ListError, ListResult, ObjectLister};

use crate::client::{HttpClient, HttpError};

/// One page of `GET /storage/v1/b/{bucket}/o`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    bucket: String,
    updated: DateTime<Utc>,
}

/// Lists objects through the Cloud Storage JSON API, following page tokens
/// until the listing is complete.
pub struct GcsLister {
    client: HttpClient,
    page_size: u32,
}

impl GcsLister {
    pub fn new(
        endpoint: &str,
        bearer_token: Option<String>,
        timeout: Duration,
        page_size: u32,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            client: HttpClient::new(endpoint, bearer_token, timeout)?,
            page_size,
        })
    }

    async fn fetch_page(&self, bucket: &str, page_token: Option<&str>) -> ListResult<ObjectsPage> {
        let mut url = self.client.url(["storage", "v1", "b", bucket, "o"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &self.page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let resp = self.client.get(&url).await?;
        if resp.status == reqwest::StatusCode::NOT_FOUND {
            return Err(ListError::BucketNotFound(bucket.to_string()));
        }
        if !resp.status.is_success() {
            return Err(ListError::Status {
                status: resp.status.as_u16(),
                body: resp.body_text(),
            });
        }

        serde_json::from_slice(&resp.body).map_err(|e| ListError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ObjectLister for GcsLister {
    async fn list(&self, bucket: &str) -> ListResult<Vec<ListedObject>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.fetch_page(bucket, page_token.as_deref()).await?;
            pages += 1;
            objects.extend(page.items.into_iter().map(|item| ListedObject {
                url: object_url(&item.bucket, &item.name),
                updated: item.updated,
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if page_token.as_deref() == Some(token.as_str()) {
                        return Err(ListError::Decode(format!(
                            "page token {token} repeated, listing would not terminate"
                        )));
                    }
                    debug!(%bucket, pages, objects = objects.len(), "fetching next page");
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        info!(%bucket, pages, objects = objects.len(), "bucket listed");
        Ok(objects)
    }
}
