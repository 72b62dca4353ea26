//! HTTP client shared by the storage and pub/sub adapters.
//!
//! Wraps a pooled `reqwest::Client` with rustls, so endpoints may be the
//! public `https://` Google APIs or a plain `http://` emulator.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use bucketwatch_reconcile::{ListError, NotifyError};

const USER_AGENT: &str = concat!("bucketwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("building http client failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("connect failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request timed out after {timeout:?}")]
    Timeout {
        timeout: Duration,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<HttpError> for ListError {
    fn from(e: HttpError) -> Self {
        ListError::Transport(e.to_string())
    }
}

impl From<HttpError> for NotifyError {
    fn from(e: HttpError) -> Self {
        NotifyError::Transport(e.to_string())
    }
}

#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body as text, for error reporting.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    http: reqwest::Client,
    base: Url,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(
        endpoint: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, HttpError> {
        let invalid = |reason: &str| HttpError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let base = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("only http:// and https:// endpoints are supported"));
        }
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(invalid("missing host"));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(HttpError::Client)?;

        Ok(Self {
            http,
            base,
            bearer_token,
            timeout,
        })
    }

    /// Endpoint url extended with the given path segments (percent-encoded).
    pub fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn get(&self, url: &Url) -> Result<HttpResponse, HttpError> {
        self.send("GET", url, self.http.get(url.clone())).await
    }

    pub async fn post_json(
        &self,
        url: &Url,
        body: &impl Serialize,
    ) -> Result<HttpResponse, HttpError> {
        self.send("POST", url, self.http.post(url.clone()).json(body))
            .await
    }

    async fn send(
        &self,
        method: &str,
        url: &Url,
        mut request: RequestBuilder,
    ) -> Result<HttpResponse, HttpError> {
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let result = async {
            let resp = request.send().await?;
            let status = resp.status();
            let body = resp.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        }
        .await;

        match result {
            Ok(resp) => {
                debug!(%method, path = %url.path(), status = %resp.status, "http request completed");
                Ok(resp)
            }
            Err(e) => {
                debug!(%method, path = %url.path(), error = %e, "http request failed");
                Err(self.classify(e))
            }
        }
    }

    fn classify(&self, e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout {
                timeout: self.timeout,
                source: e,
            }
        } else if e.is_connect() {
            HttpError::Connect(e)
        } else {
            HttpError::Request(e)
        }
    }
}
