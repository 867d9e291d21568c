use thiserror::Error;

use inflow_net::NetError;

/// Errors surfaced to the embedding application.
#[derive(Error, Debug)]
pub enum InboxError {
    /// Transport or backend failure. Reconciled state is untouched, so the
    /// operation is safe to retry.
    #[error("network error: {0}")]
    Net(#[from] NetError),

    /// The event source task has terminated and can no longer be commanded.
    #[error("event source terminated")]
    SourceClosed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InboxError>;
