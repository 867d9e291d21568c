use thiserror::Error;

use inflow_shared::RejectReason;

/// Errors produced by the transport layer.
///
/// Transport failures are retryable: reconciled state is never touched on a
/// failed poll, so the caller can simply try again next tick.
#[derive(Error, Debug)]
pub enum NetError {
    /// HTTP transport failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error (status {status}): {detail}")]
    Api { status: u16, detail: String },

    /// The payload was not the JSON shape we expect.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The payload parsed but failed semantic validation.
    #[error("Rejected payload: {0}")]
    Rejected(#[from] RejectReason),

    /// The backend refused to send the message.
    #[error("Send rejected: {0}")]
    SendRejected(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
