//! Decoding snapshot records returned by the message-listing endpoint.
//!
//! The endpoint returns a flat array mixing message observations and status
//! callbacks, tagged by a `type` field. Records use snake_case keys and
//! unix-seconds timestamps (usually as strings). Everything is validated
//! here; a record that cannot be narrowed into a typed event is rejected
//! with a reason instead of flowing into the engine.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use inflow_shared::{
    ConversationKey, DeliveryStatus, Direction, InboxEvent, MessageEvent, MessageId, MessageKind,
    RejectReason, StatusEvent,
};

/// Raw snapshot record as served by `GET /messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: String,
    /// Unix seconds, as a string or a bare number.
    #[serde(default)]
    pub timestamp: Value,
    pub direction: Option<String>,
    pub from: Option<String>,
    pub recipient_id: Option<String>,
    pub text: Option<String>,
    pub msg_type: Option<String>,
    /// Nested contact blob; only `contact.profile.name` is consumed.
    pub contact: Option<Value>,
    pub status: Option<String>,
}

/// Narrow a raw record into a typed event.
pub fn normalize(record: SnapshotRecord) -> Result<InboxEvent, RejectReason> {
    match record.kind.as_str() {
        "message" => normalize_message(record).map(InboxEvent::Message),
        "status" => normalize_status(record).map(InboxEvent::Status),
        _ => Err(RejectReason::UnknownRecordType),
    }
}

fn normalize_message(record: SnapshotRecord) -> Result<MessageEvent, RejectReason> {
    if record.id.is_empty() {
        return Err(RejectReason::MissingId);
    }
    let created_at = parse_unix_secs(&record.timestamp).ok_or(RejectReason::BadTimestamp)?;

    let direction = match record.direction.as_deref() {
        Some("incoming") => Direction::Incoming,
        Some("outgoing") => Direction::Outgoing,
        _ => return Err(RejectReason::UnknownDirection),
    };

    // The conversation key is the other party: declared recipient for
    // outgoing messages, declared sender for incoming ones.
    let counterpart = match direction {
        Direction::Outgoing => record.recipient_id,
        Direction::Incoming => record.from,
    };
    let conversation = match counterpart {
        Some(key) if !key.is_empty() => ConversationKey(key),
        _ => return Err(RejectReason::MissingConversation),
    };

    let kind = record
        .msg_type
        .as_deref()
        .unwrap_or("text")
        .parse::<MessageKind>()
        .unwrap_or(MessageKind::Media);

    Ok(MessageEvent {
        id: MessageId(record.id),
        provider_id: None,
        conversation,
        direction,
        kind,
        body: record.text,
        contact_name: contact_profile_name(record.contact.as_ref()),
        created_at,
        status: record.status.as_deref().and_then(lenient_status),
    })
}

fn normalize_status(record: SnapshotRecord) -> Result<StatusEvent, RejectReason> {
    if record.id.is_empty() {
        return Err(RejectReason::MissingId);
    }
    let status = record
        .status
        .as_deref()
        .and_then(lenient_status)
        .ok_or(RejectReason::UnknownStatus)?;
    let observed_at = parse_unix_secs(&record.timestamp).ok_or(RejectReason::BadTimestamp)?;

    Ok(StatusEvent {
        message_ref: record.id,
        provider_ref: None,
        status,
        observed_at,
    })
}

/// Parse a delivery status, tolerating the backend's pre-ack `"sending"`
/// label (mapped to queued). Unknown labels yield `None`.
pub(crate) fn lenient_status(raw: &str) -> Option<DeliveryStatus> {
    if raw == "sending" {
        return Some(DeliveryStatus::Queued);
    }
    match raw.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            debug!(status = raw, "Unrecognized delivery status");
            None
        }
    }
}

fn parse_unix_secs(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

fn contact_profile_name(contact: Option<&Value>) -> Option<String> {
    let name = contact?.get("profile")?.get("name")?.as_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
