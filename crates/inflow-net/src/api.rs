//! Thin HTTP client for the backend message API.
//!
//! Two operations matter to the engine: listing the full message snapshot
//! and sending a text message. A successful send returns the created message
//! in the push shape so the caller can fold it in immediately instead of
//! waiting for the next poll.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use inflow_shared::MessageEvent;

use crate::error::{NetError, Result};
use crate::push;

/// Backend API client.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SendEnvelope {
    #[serde(default)]
    success: bool,
    message: Option<Value>,
    error: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the full message snapshot for the tenant.
    ///
    /// Returned as raw JSON values so one malformed record can be skipped
    /// without discarding the rest of the batch.
    pub async fn list_messages(&self) -> Result<Vec<Value>> {
        let response = self.client.get(self.url("/messages")).send().await?;
        let response = check_status(response).await?;
        let records: Vec<Value> = response.json().await?;
        debug!(count = records.len(), "Fetched message snapshot");
        Ok(records)
    }

    /// Send a text message to a counterpart.
    ///
    /// On success the backend echoes the created message; it is decoded into
    /// a [`MessageEvent`] ready for an optimistic merge. On failure nothing
    /// is returned and nothing should be inserted.
    pub async fn send_text(&self, phone: &str, body: &str) -> Result<MessageEvent> {
        let response = self
            .client
            .post(self.url("/send-message"))
            .json(&json!({ "phone": phone, "message": body }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let envelope: SendEnvelope = response.json().await?;
        if !envelope.success {
            return Err(NetError::SendRejected(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        let message = envelope
            .message
            .ok_or_else(|| NetError::SendRejected("response carried no message".to_string()))?;

        push::decode_message(&message)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies carry a human-readable `detail` field when the backend
    // produced them itself.
    let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("detail")?.as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    Err(NetError::Api {
        status: status.as_u16(),
        detail,
    })
}
