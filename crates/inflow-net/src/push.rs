//! Decoding live push frames.
//!
//! The live channel delivers frames as `(event name, JSON payload)` pairs in
//! a camelCase shape that differs from the snapshot records. Payloads are
//! dynamic JSON from the transport and are narrowed here; nothing dynamic
//! crosses into the engine.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use inflow_shared::{
    ConversationKey, Direction, InboxEvent, MessageEvent, MessageId, MessageKind, RejectReason,
    StatusEvent,
};

use crate::error::Result;
use crate::snapshot::lenient_status;

/// Push event name for a newly created message.
pub const EVENT_NEW_MESSAGE: &str = "new_message";
/// Push event name for a delivery-status change.
pub const EVENT_MESSAGE_STATUS: &str = "message_status_update";

/// One frame from the live channel, as handed over by the (external)
/// transport connection.
#[derive(Debug, Clone, Deserialize)]
pub struct PushFrame {
    /// Event name, e.g. `new_message`.
    pub event: String,
    /// Raw payload; shape depends on the event name.
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    #[serde(default)]
    id: String,
    /// The counterpart's address; doubles as the conversation key.
    #[serde(default)]
    chat_id: String,
    #[serde(default)]
    sender_id: String,
    text: Option<String>,
    status: Option<String>,
    created_at: Option<DateTime<Utc>>,
    whatsapp_message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushStatusUpdate {
    #[serde(default)]
    message_id: String,
    whatsapp_message_id: Option<String>,
    status: Option<String>,
    /// RFC 3339 or unix seconds; the backend is not consistent about it.
    timestamp: Option<String>,
}

/// Decode a frame into a typed event.
///
/// `received_at` is used as the status observation time when the payload
/// does not carry its own timestamp.
pub fn decode_frame(frame: &PushFrame, received_at: DateTime<Utc>) -> Result<InboxEvent> {
    match frame.event.as_str() {
        EVENT_NEW_MESSAGE => decode_message(&frame.payload).map(InboxEvent::Message),
        EVENT_MESSAGE_STATUS => {
            decode_status(&frame.payload, received_at).map(InboxEvent::Status)
        }
        _ => Err(RejectReason::UnknownRecordType.into()),
    }
}

/// Decode a pushed (or send-response) message payload.
pub fn decode_message(payload: &Value) -> Result<MessageEvent> {
    let raw: PushMessage = serde_json::from_value(payload.clone())?;

    if raw.id.is_empty() {
        return Err(RejectReason::MissingId.into());
    }
    if raw.chat_id.is_empty() {
        return Err(RejectReason::MissingConversation.into());
    }
    let created_at = raw.created_at.ok_or(RejectReason::BadTimestamp)?;

    // `chatId` names the counterpart, so a message whose sender is the
    // counterpart is incoming and everything else left the tenant.
    let direction = if raw.sender_id == raw.chat_id {
        Direction::Incoming
    } else {
        Direction::Outgoing
    };

    Ok(MessageEvent {
        id: MessageId(raw.id),
        provider_id: raw.whatsapp_message_id,
        conversation: ConversationKey(raw.chat_id),
        direction,
        kind: MessageKind::Text,
        body: raw.text,
        contact_name: None,
        created_at,
        status: raw.status.as_deref().and_then(lenient_status),
    })
}

fn decode_status(payload: &Value, received_at: DateTime<Utc>) -> Result<StatusEvent> {
    let raw: PushStatusUpdate = serde_json::from_value(payload.clone())?;

    if raw.message_id.is_empty() {
        return Err(RejectReason::MissingId.into());
    }
    let status = raw
        .status
        .as_deref()
        .and_then(lenient_status)
        .ok_or(RejectReason::UnknownStatus)?;

    Ok(StatusEvent {
        message_ref: raw.message_id,
        provider_ref: raw.whatsapp_message_id,
        status,
        observed_at: raw
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(received_at),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = raw.parse::<DateTime<Utc>>() {
        return Some(parsed);
    }
    let secs = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetError;
    use inflow_shared::DeliveryStatus;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_000, 0).unwrap()
    }

    #[test]
    fn test_decode_outgoing_new_message() {
        let frame = PushFrame {
            event: EVENT_NEW_MESSAGE.to_string(),
            payload: json!({
                "id": "m1",
                "chatId": "+1555",
                "senderId": "tenant-1",
                "receiverId": "+1555",
                "text": "hello",
                "status": "sent",
                "createdAt": "2024-05-01T12:00:00Z",
                "whatsappMessageId": "wamid.abc",
            }),
        };

        let InboxEvent::Message(message) = decode_frame(&frame, now()).unwrap() else {
            panic!("expected message event");
        };
        assert_eq!(message.direction, Direction::Outgoing);
        assert_eq!(message.conversation, "+1555".into());
        assert_eq!(message.provider_id.as_deref(), Some("wamid.abc"));
        assert_eq!(message.status, Some(DeliveryStatus::Sent));
    }

    #[test]
    fn test_decode_incoming_new_message() {
        let payload = json!({
            "id": "m2",
            "chatId": "+1555",
            "senderId": "+1555",
            "receiverId": "tenant-1",
            "text": "hi back",
            "createdAt": "2024-05-01T12:01:00Z",
        });

        let message = decode_message(&payload).unwrap();
        assert_eq!(message.direction, Direction::Incoming);
    }

    #[test]
    fn test_decode_status_update_with_fallback_time() {
        let frame = PushFrame {
            event: EVENT_MESSAGE_STATUS.to_string(),
            payload: json!({
                "messageId": "m1",
                "whatsappMessageId": "wamid.abc",
                "status": "delivered",
            }),
        };

        let InboxEvent::Status(status) = decode_frame(&frame, now()).unwrap() else {
            panic!("expected status event");
        };
        assert_eq!(status.message_ref, "m1");
        assert_eq!(status.provider_ref.as_deref(), Some("wamid.abc"));
        assert_eq!(status.status, DeliveryStatus::Delivered);
        assert_eq!(status.observed_at, now());
    }

    #[test]
    fn test_status_timestamp_accepts_unix_seconds() {
        let payload = json!({
            "messageId": "m1",
            "status": "read",
            "timestamp": "1714564800",
        });

        let status = decode_status(&payload, now()).unwrap();
        assert_eq!(status.observed_at.timestamp(), 1_714_564_800);
    }

    #[test]
    fn test_unknown_event_name_is_rejected() {
        let frame = PushFrame {
            event: "typing_indicator".to_string(),
            payload: json!({}),
        };
        assert!(matches!(
            decode_frame(&frame, now()),
            Err(NetError::Rejected(RejectReason::UnknownRecordType))
        ));
    }

    #[test]
    fn test_message_without_created_at_is_rejected() {
        let payload = json!({
            "id": "m1",
            "chatId": "+1555",
            "senderId": "tenant-1",
        });
        assert!(matches!(
            decode_message(&payload),
            Err(NetError::Rejected(RejectReason::BadTimestamp))
        ));
    }
}
