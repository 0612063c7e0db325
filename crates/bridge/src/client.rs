// crates/bridge/src/client.rs
//! HTTP client for the dashboard API.
//!
//! Every call goes through the shared [`RetryPolicy`] and carries
//! `X-API-Key` and this bridge's `X-Client-Id`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::identity::ClientIdentity;
use crate::pending::PendingEntry;
use crate::retry::{parse_retry_after, RetryPolicy, Sleeper, TokioSleeper};

const API_KEY_HEADER: &str = "X-API-Key";
const CLIENT_ID_HEADER: &str = "X-Client-Id";

#[derive(Debug, Clone, Deserialize)]
pub struct HealthReply {
    pub status: String,
    #[serde(default)]
    pub live_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveReply {
    pub live: bool,
    #[serde(default)]
    pub elapsed_seconds: u64,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountReply {
    #[serde(default)]
    pub total_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReply {
    #[serde(default)]
    pub accepted: usize,
    #[serde(default)]
    pub rejected: usize,
    #[serde(default)]
    pub total_count: usize,
}

pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    identity: ClientIdentity,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SyncClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        identity: ClientIdentity,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            identity,
            policy,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
            .header(CLIENT_ID_HEADER, self.identity.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(parse_retry_after);
            return Err(ClientError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        self.policy
            .run(self.sleeper.as_ref(), operation, |_| {
                self.send_once(method.clone(), path, body.as_ref())
            })
            .await
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthReply, ClientError> {
        self.call("health", Method::GET, "/health", None).await
    }

    /// GET /live_status
    pub async fn live_status(&self) -> Result<LiveReply, ClientError> {
        self.call("live_status", Method::GET, "/live_status", None)
            .await
    }

    /// POST /set_live as this bridge. A refusal comes back as
    /// [`ClientError::OwnershipConflict`].
    pub async fn set_live(&self, desired: bool) -> Result<LiveReply, ClientError> {
        let body = json!({"live": desired, "owner": self.identity.as_str()});
        let reply: LiveReply = self
            .call("set_live", Method::POST, "/set_live", Some(body))
            .await?;
        match reply.error {
            Some(message) => Err(ClientError::OwnershipConflict {
                owner: reply.owner,
                message,
            }),
            None => Ok(reply),
        }
    }

    /// POST /add_trick_or_treater
    pub async fn add_entry(&self) -> Result<CountReply, ClientError> {
        self.call("add_entry", Method::POST, "/add_trick_or_treater", None)
            .await
    }

    /// POST /undo_last_entry
    pub async fn undo_last_entry(&self) -> Result<CountReply, ClientError> {
        self.call("undo_last_entry", Method::POST, "/undo_last_entry", None)
            .await
    }

    /// POST /upload_batch
    pub async fn upload_batch(&self, entries: &[PendingEntry]) -> Result<UploadReply, ClientError> {
        let data: Vec<Value> = entries.iter().map(PendingEntry::to_upload).collect();
        self.call(
            "upload_batch",
            Method::POST,
            "/upload_batch",
            Some(json!({ "data": data })),
        )
        .await
    }
}
