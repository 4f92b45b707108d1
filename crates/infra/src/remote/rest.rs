//! REST remote store
//!
//! Talks to a PostgREST-style API: table rows under `{base}/{table}`,
//! filters as `?id=eq.{id}`, stored procedures under `{base}/rpc/{name}`.
//!
//! Failures are rendered as [`RemoteError`]s whose text the engine's
//! classifier understands: connect failures read as network errors,
//! timeouts as timeouts, and HTTP statuses as `401 unauthorized`,
//! `403 forbidden`, `400 bad request`, `5xx server error` or
//! `4xx client error`. Response bodies are never copied into the message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use versesync_core::RemoteStore;
use versesync_domain::{
    CommentPayload, DeletePayload, LikePayload, PostPayload, RemoteError, UpdatePayload,
};

use crate::errors::{InfraError, InfraResult};

const POSTS_TABLE: &str = "community_posts";
const COMMENTS_TABLE: &str = "community_comments";
const TOGGLE_LIKE_RPC: &str = "toggle_community_like";

#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    client: Client,
    base_url: String,
    user_id: Option<String>,
}

impl RestRemoteStore {
    pub fn builder(base_url: impl Into<String>) -> RestRemoteStoreBuilder {
        RestRemoteStoreBuilder::new(base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn row_filter(record_id: &str) -> [(&'static str, String); 1] {
        [("id", format!("eq.{record_id}"))]
    }

    fn with_user(&self, mut body: Value) -> Value {
        if let (Some(user_id), Some(fields)) = (&self.user_id, body.as_object_mut()) {
            fields.insert("user_id".into(), Value::String(user_id.clone()));
        }
        body
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        match request.send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status();
                debug!(%status, url = %response.url(), "Remote store rejected request");
                Err(status_error(status))
            }
            Err(err) => {
                debug!(error = %err, "Remote store request failed");
                Err(transport_error(&err))
            }
        }
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    #[instrument(skip(self, payload), fields(post_id = %payload.post_id))]
    async fn toggle_like(&self, payload: &LikePayload) -> Result<(), RemoteError> {
        let body = json!({
            "p_post_id": payload.post_id,
            "p_user_id": self.user_id,
            "p_liked": payload.liked,
        });
        self.send(self.client.post(self.url(&format!("rpc/{TOGGLE_LIKE_RPC}"))).json(&body))
            .await
    }

    #[instrument(skip(self, payload), fields(post_id = %payload.post_id))]
    async fn create_comment(&self, payload: &CommentPayload) -> Result<(), RemoteError> {
        let mut body = json!({ "post_id": payload.post_id, "content": payload.content });
        if let Some(parent_id) = &payload.parent_id {
            body["parent_id"] = Value::String(parent_id.clone());
        }
        self.send(self.client.post(self.url(COMMENTS_TABLE)).json(&self.with_user(body))).await
    }

    #[instrument(skip(self, payload))]
    async fn create_post(&self, payload: &PostPayload) -> Result<(), RemoteError> {
        let body = json!({
            "title": payload.title,
            "content": payload.content,
            "passage": payload.passage,
        });
        self.send(self.client.post(self.url(POSTS_TABLE)).json(&self.with_user(body))).await
    }

    #[instrument(
        skip(self, payload),
        fields(table = %payload.table, record_id = %payload.record_id)
    )]
    async fn delete_record(&self, payload: &DeletePayload) -> Result<(), RemoteError> {
        let request = self
            .client
            .delete(self.url(&payload.table))
            .query(&Self::row_filter(&payload.record_id));
        self.send(request).await
    }

    #[instrument(
        skip(self, payload),
        fields(table = %payload.table, record_id = %payload.record_id)
    )]
    async fn update_record(&self, payload: &UpdatePayload) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.url(&payload.table))
            .query(&Self::row_filter(&payload.record_id))
            .json(&payload.changes);
        self.send(request).await
    }
}

/// Render a non-success HTTP status as a classifiable failure
pub fn status_error(status: StatusCode) -> RemoteError {
    let code = status.as_u16();
    match code {
        400 | 422 => RemoteError::new("ValidationError", format!("{code} bad request")),
        401 => RemoteError::new("AuthError", "401 unauthorized"),
        403 => RemoteError::new("PermissionError", "403 forbidden"),
        408 => RemoteError::new("TimeoutError", "408 request timed out"),
        500..=599 => RemoteError::new("ServerError", format!("{code} server error")),
        400..=499 => RemoteError::new("ClientError", format!("{code} client error")),
        _ => RemoteError::new("HttpError", format!("unexpected status {code}")),
    }
}

/// Render a transport failure as a classifiable failure
pub fn transport_error(err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::new("TimeoutError", "request timed out")
    } else if err.is_connect() {
        RemoteError::new("NetworkError", "connection failed")
    } else {
        RemoteError::new("NetworkError", format!("network request failed: {err}"))
    }
}

/// Builder for [`RestRemoteStore`].
#[derive(Debug)]
pub struct RestRemoteStoreBuilder {
    base_url: String,
    timeout: Duration,
    api_key: Option<String>,
    access_token: Option<String>,
    user_id: Option<String>,
    user_agent: Option<String>,
}

impl RestRemoteStoreBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            api_key: None,
            access_token: None,
            user_id: None,
            user_agent: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Project key sent as the `apikey` header
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Session token sent as `Authorization: Bearer ...`
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Author recorded on created rows and like toggles
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// # Errors
    /// Fails if a credential is not a valid header value or the HTTP client
    /// cannot be built.
    pub fn build(self) -> InfraResult<RestRemoteStore> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=minimal"));
        if let Some(key) = &self.api_key {
            headers.insert("apikey", header_value(key)?);
        }
        if let Some(token) = &self.access_token {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        }

        let mut builder =
            Client::builder().timeout(self.timeout).default_headers(headers).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        Ok(RestRemoteStore {
            client: builder.build()?,
            base_url: self.base_url,
            user_id: self.user_id,
        })
    }
}

fn header_value(raw: &str) -> InfraResult<HeaderValue> {
    let mut value = HeaderValue::from_str(raw)
        .map_err(|e| InfraError::Http(format!("invalid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use versesync_core::{classify, ErrorKind};

    use super::*;

    fn kind_of(err: &RemoteError) -> ErrorKind {
        classify(&err.name, &err.message)
    }

    /// Validates `status_error` rendering against the engine classifier.
    ///
    /// Assertions:
    /// - Each status family lands in the expected error kind.
    #[test]
    fn test_status_errors_classify_as_expected() {
        let cases = [
            (StatusCode::BAD_REQUEST, ErrorKind::Validation),
            (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::Validation),
            (StatusCode::UNAUTHORIZED, ErrorKind::Authentication),
            (StatusCode::FORBIDDEN, ErrorKind::Authorization),
            (StatusCode::REQUEST_TIMEOUT, ErrorKind::Timeout),
            (StatusCode::NOT_FOUND, ErrorKind::Client),
            (StatusCode::TOO_MANY_REQUESTS, ErrorKind::Client),
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Server),
            (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Server),
        ];

        for (status, expected) in cases {
            assert_eq!(kind_of(&status_error(status)), expected, "{status}");
        }
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let store = RestRemoteStore::builder("http://localhost:54321/rest/v1/").build().unwrap();
        assert_eq!(store.url("community_posts"), "http://localhost:54321/rest/v1/community_posts");
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let err = RestRemoteStore::builder("http://localhost").access_token("bad\ntoken").build();
        assert!(matches!(err, Err(InfraError::Http(_))));
    }
}
