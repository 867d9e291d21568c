//! Deriving the externally consumed view from reconciled state.
//!
//! The projection is pure and deterministic: identical state always yields
//! byte-for-byte identical output, so the UI layer can diff views without
//! spurious re-renders. Every struct here serializes in the camelCase shape
//! the display layer consumes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use inflow_shared::constants::PREVIEW_MAX_CHARS;
use inflow_shared::{ConversationKey, DeliveryStatus, Direction, MessageId};

use crate::state::{ConversationState, MessageState, ReconcilerState};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboxView {
    pub conversations: Vec<ConversationView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub key: ConversationKey,
    pub display_name: String,
    pub last_message_preview: String,
    pub last_activity_at: DateTime<Utc>,
    pub has_counterpart_responded: bool,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: MessageId,
    pub direction: Direction,
    /// Display text; non-text payloads render as a bracketed kind tag.
    pub body: String,
    pub status: Option<DeliveryStatus>,
    pub created_at: DateTime<Utc>,
}

/// Project reconciled state into the display shape.
///
/// Conversations are sorted descending by last activity (key as tiebreak,
/// so the order is total); messages within a conversation ascending by
/// `created_at`, ties broken by arrival order.
pub fn project(state: &ReconcilerState) -> InboxView {
    let mut conversations: Vec<ConversationView> =
        state.conversations().filter_map(conversation_view).collect();

    conversations.sort_by(|a, b| {
        b.last_activity_at
            .cmp(&a.last_activity_at)
            .then_with(|| a.key.cmp(&b.key))
    });

    InboxView { conversations }
}

fn conversation_view(conv: &ConversationState) -> Option<ConversationView> {
    let latest = conv.latest_message()?;

    let mut messages: Vec<MessageView> = conv.messages().iter().map(message_view).collect();
    // Stable sort: the vec is in arrival order, which breaks timestamp ties.
    messages.sort_by_key(|message| message.created_at);

    Some(ConversationView {
        key: conv.key().clone(),
        display_name: conv.display_name().to_string(),
        last_message_preview: preview(&display_body(latest)),
        last_activity_at: latest.created_at,
        has_counterpart_responded: conv.has_counterpart_responded(),
        messages,
    })
}

fn message_view(message: &MessageState) -> MessageView {
    MessageView {
        id: message.id.clone(),
        direction: message.direction,
        body: display_body(message),
        status: message.status,
        created_at: message.created_at,
    }
}

fn display_body(message: &MessageState) -> String {
    match message.body.as_deref() {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("[{}]", message.kind.label()),
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let cut: String = chars.by_ref().take(PREVIEW_MAX_CHARS).collect();
    if chars.next().is_none() {
        cut
    } else {
        let mut truncated = cut;
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::reconcile;
    use chrono::TimeZone;
    use inflow_shared::{InboxEvent, MessageEvent, MessageKind};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn msg(id: &str, key: &str, direction: Direction, secs: i64) -> InboxEvent {
        InboxEvent::Message(MessageEvent {
            id: id.into(),
            provider_id: None,
            conversation: key.into(),
            direction,
            kind: MessageKind::Text,
            body: Some(format!("body of {id}")),
            contact_name: None,
            created_at: at(secs),
            status: None,
        })
    }

    #[test]
    fn test_conversations_sorted_by_most_recent_activity() {
        let state = reconcile([
            msg("m1", "+1555", Direction::Incoming, 100),
            msg("m2", "+1777", Direction::Incoming, 300),
            msg("m3", "+1555", Direction::Outgoing, 200),
        ]);

        let view = project(&state);
        assert_eq!(view.conversations.len(), 2);
        assert_eq!(view.conversations[0].key, "+1777".into());
        assert_eq!(view.conversations[1].key, "+1555".into());
        assert_eq!(view.conversations[1].last_activity_at, at(200));
    }

    #[test]
    fn test_messages_ascending_with_stable_ties() {
        let state = reconcile([
            msg("m3", "+1555", Direction::Outgoing, 200),
            msg("m1", "+1555", Direction::Incoming, 100),
            // Same timestamp as m1: arrival order decides.
            msg("m2", "+1555", Direction::Incoming, 100),
        ]);

        let view = project(&state);
        let ids: Vec<&str> = view.conversations[0]
            .messages
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn test_activity_tie_broken_by_key() {
        let state = reconcile([
            msg("m1", "+1777", Direction::Incoming, 100),
            msg("m2", "+1555", Direction::Incoming, 100),
        ]);

        let view = project(&state);
        assert_eq!(view.conversations[0].key, "+1555".into());
        assert_eq!(view.conversations[1].key, "+1777".into());
    }

    #[test]
    fn test_non_text_payload_renders_bracketed_tag() {
        let mut event = match msg("m1", "+1555", Direction::Incoming, 100) {
            InboxEvent::Message(m) => m,
            _ => unreachable!(),
        };
        event.kind = MessageKind::Image;
        event.body = None;

        let view = project(&reconcile([InboxEvent::Message(event)]));
        assert_eq!(view.conversations[0].last_message_preview, "[image]");
        assert_eq!(view.conversations[0].messages[0].body, "[image]");
    }

    #[test]
    fn test_preview_is_truncated() {
        let mut event = match msg("m1", "+1555", Direction::Incoming, 100) {
            InboxEvent::Message(m) => m,
            _ => unreachable!(),
        };
        event.body = Some("x".repeat(PREVIEW_MAX_CHARS + 20));

        let view = project(&reconcile([InboxEvent::Message(event)]));
        let preview = &view.conversations[0].last_message_preview;
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS + 1);
        assert!(preview.ends_with('…'));
        // The full body is untouched in the message list.
        assert_eq!(
            view.conversations[0].messages[0].body.chars().count(),
            PREVIEW_MAX_CHARS + 20
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let state = reconcile([
            msg("m1", "+1555", Direction::Incoming, 100),
            msg("m2", "+1777", Direction::Outgoing, 200),
            msg("m3", "+1999", Direction::Incoming, 150),
        ]);

        let first = serde_json::to_string(&project(&state)).unwrap();
        let second = serde_json::to_string(&project(&state)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_display_name_falls_back_to_key() {
        let mut event = match msg("m1", "+1555", Direction::Incoming, 100) {
            InboxEvent::Message(m) => m,
            _ => unreachable!(),
        };
        event.contact_name = Some("Ada Lovelace".to_string());

        let view = project(&reconcile([
            InboxEvent::Message(event),
            msg("m2", "+1777", Direction::Incoming, 50),
        ]));

        assert_eq!(view.conversations[0].display_name, "Ada Lovelace");
        assert_eq!(view.conversations[1].display_name, "+1777");
    }
}
