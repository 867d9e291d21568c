//! Normalized event records consumed by the reconciliation engine.
//!
//! Both transports (snapshot polling and live push) are narrowed into these
//! two variants at the adapter boundary, so the engine never touches raw
//! provider payloads. Validation is explicit: an event that cannot name its
//! message or its conversation is rejected with a [`RejectReason`] instead of
//! flowing deeper into the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RejectReason;
use crate::types::{ConversationKey, DeliveryStatus, Direction, MessageId, MessageKind};

/// Observation of a message (inbound or outbound) on the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEvent {
    /// Canonical message id, stable across retransmission.
    pub id: MessageId,
    /// Provider-assigned alternate id, if the channel reports one.
    /// Status events may reference a message by either id.
    pub provider_id: Option<String>,
    /// The other party: declared recipient for outgoing messages, declared
    /// sender for incoming ones.
    pub conversation: ConversationKey,
    pub direction: Direction,
    pub kind: MessageKind,
    /// Display text. `None` (or empty) for non-text payloads, which render
    /// as a bracketed kind tag instead.
    pub body: Option<String>,
    /// Best-known display name of the counterpart at observation time.
    pub contact_name: Option<String>,
    /// Source of truth for ordering within a conversation.
    pub created_at: DateTime<Utc>,
    /// Delivery status at time of first observation, when embedded.
    pub status: Option<DeliveryStatus>,
}

impl MessageEvent {
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.id.is_empty() {
            return Err(RejectReason::MissingId);
        }
        if self.conversation.is_empty() {
            return Err(RejectReason::MissingConversation);
        }
        Ok(())
    }
}

/// A delivery-status callback for a previously (or not yet) observed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEvent {
    /// The referenced message, by either its canonical id or a provider id.
    pub message_ref: String,
    /// Secondary reference carried by some push payloads.
    pub provider_ref: Option<String>,
    pub status: DeliveryStatus,
    /// When this status was observed. Not necessarily monotonic with
    /// arrival order.
    pub observed_at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.message_ref.is_empty() {
            return Err(RejectReason::MissingId);
        }
        Ok(())
    }
}

/// Single feed of everything the engine folds over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboxEvent {
    Message(MessageEvent),
    Status(StatusEvent),
}

impl InboxEvent {
    pub fn validate(&self) -> Result<(), RejectReason> {
        match self {
            Self::Message(m) => m.validate(),
            Self::Status(s) => s.validate(),
        }
    }
}
