use thiserror::Error;

/// Why a raw record or normalized event was rejected instead of folded.
///
/// Rejections are never fatal: the adapter or reconciler logs them and
/// continues with the rest of the batch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("missing message id")]
    MissingId,

    #[error("missing conversation key")]
    MissingConversation,

    #[error("missing or unparseable timestamp")]
    BadTimestamp,

    #[error("unknown direction")]
    UnknownDirection,

    #[error("unknown delivery status")]
    UnknownStatus,

    #[error("unknown record type")]
    UnknownRecordType,
}
