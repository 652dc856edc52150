//! Client for a Langfuse-compatible ingestion API.
//!
//! Events are queued in memory and sent in one batch by [`ObservabilityClient::flush`]:
//!
//! ```text
//! POST {host}/api/public/ingestion
//! Authorization: Basic base64(public_key:secret_key)
//! {"batch": [{"id", "timestamp", "type", "body"}, ...]}
//! ```
//!
//! Without credentials the client is local: trace ids are still minted by the caller,
//! but events are discarded on arrival so nothing accumulates.

use super::ObservabilityConfig;
use crate::error::MenuAgentError;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Ingestion endpoint path, relative to the host
pub const INGESTION_PATH: &str = "/api/public/ingestion";

/// Failures talking to the ingestion API
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("Ingestion request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Ingestion rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<ObservabilityError> for MenuAgentError {
    fn from(error: ObservabilityError) -> Self {
        MenuAgentError::network_error(error.to_string())
    }
}

#[derive(Clone)]
struct Credentials {
    public_key: String,
    secret_key: String,
}

impl Credentials {
    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.public_key, self.secret_key);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// Timestamp format used in every ingestion event
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Queue of ingestion events plus the HTTP client that ships them
///
/// Clones share the queue.
#[derive(Clone)]
pub struct ObservabilityClient {
    host: String,
    credentials: Option<Credentials>,
    client: reqwest::Client,
    queue: Arc<Mutex<Vec<Value>>>,
}

impl std::fmt::Debug for ObservabilityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityClient")
            .field("host", &self.host)
            .field(
                "public_key",
                &self.credentials.as_ref().map(|c| c.public_key.as_str()),
            )
            .field("pending", &self.pending())
            .finish()
    }
}

impl ObservabilityClient {
    /// Client that discards every event
    pub fn local(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            credentials: None,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Client that exports to `host` with basic auth
    pub fn with_credentials(
        host: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            credentials: Some(Credentials {
                public_key: public_key.into(),
                secret_key: secret_key.into(),
            }),
            ..Self::local(host)
        }
    }

    /// Exporting client when both keys are configured, local otherwise
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        match (&config.public_key, &config.secret_key) {
            (Some(public_key), Some(secret_key))
                if !public_key.is_empty() && !secret_key.is_empty() =>
            {
                Self::with_credentials(&config.host, public_key, secret_key)
            }
            _ => Self::local(&config.host),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn exports(&self) -> bool {
        self.credentials.is_some()
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Queue one event of the given ingestion type; a no-op for a local client
    pub fn enqueue(&self, event_type: &str, body: Value) {
        if !self.exports() {
            return;
        }
        let event = json!({
            "id": Uuid::new_v4().to_string(),
            "timestamp": timestamp_now(),
            "type": event_type,
            "body": body,
        });
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Queue a numeric score attached to a trace
    pub fn create_score(&self, trace_id: &str, name: &str, value: f64, comment: Option<&str>) {
        let mut body = json!({
            "id": Uuid::new_v4().to_string(),
            "traceId": trace_id,
            "name": name,
            "value": value,
        });
        if let Some(comment) = comment {
            body["comment"] = Value::String(comment.to_string());
        }
        self.enqueue("score-create", body);
    }

    /// Send every queued event; returns how many were sent
    ///
    /// The queue is drained before sending, so a failed batch is not retried.
    pub async fn flush(&self) -> Result<usize, ObservabilityError> {
        let batch: Vec<Value> =
            std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner));
        if batch.is_empty() {
            return Ok(0);
        }

        let Some(credentials) = &self.credentials else {
            return Ok(0);
        };

        let count = batch.len();
        let url = format!("{}{}", self.host, INGESTION_PATH);
        let response = self
            .client
            .post(&url)
            .header("Authorization", credentials.basic_auth())
            .json(&json!({ "batch": batch }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObservabilityError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // 207 responses list per-event failures
        if let Ok(result) = response.json::<Value>().await {
            if let Some(errors) = result.get("errors").and_then(Value::as_array) {
                if !errors.is_empty() {
                    warn!("{} of {} observability events rejected", errors.len(), count);
                }
            }
        }

        debug!("Sent {} observability events to {}", count, url);
        Ok(count)
    }
}
