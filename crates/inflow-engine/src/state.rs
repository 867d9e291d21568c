//! Reconciled in-memory state.
//!
//! Maintains the map of conversations, the message-location indexes used to
//! resolve status references, and the buffer of statuses that arrived before
//! their message. The state is exclusively owned by the caller; the engine
//! keeps no globals.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use inflow_shared::{ConversationKey, DeliveryStatus, Direction, MessageId, MessageKind};

/// A single merged message. `body`, `direction` and `created_at` are
/// immutable once set; only `status` (and name metadata) advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageState {
    pub id: MessageId,
    pub provider_id: Option<String>,
    pub direction: Direction,
    pub kind: MessageKind,
    pub body: Option<String>,
    pub contact_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: Option<DeliveryStatus>,
}

/// All messages exchanged with one counterpart, plus derived summary fields.
///
/// `messages` is kept in arrival order; display ordering (ascending
/// `created_at`, stable ties) is the projector's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    key: ConversationKey,
    messages: Vec<MessageState>,
    by_id: HashMap<MessageId, usize>,
    display_name: Option<String>,
    name_noted_at: Option<DateTime<Utc>>,
    last_activity_at: Option<DateTime<Utc>>,
    latest: Option<usize>,
    has_counterpart_responded: bool,
}

impl ConversationState {
    pub(crate) fn new(key: ConversationKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
            by_id: HashMap::new(),
            display_name: None,
            name_noted_at: None,
            last_activity_at: None,
            latest: None,
            has_counterpart_responded: false,
        }
    }

    /// Append a new message (caller guarantees the id is not yet present)
    /// and update the derived summary fields.
    pub(crate) fn insert(&mut self, message: MessageState) {
        let position = self.messages.len();

        if message.direction == Direction::Incoming {
            self.has_counterpart_responded = true;
        }
        // Strictly-greater comparison: among equal timestamps the first
        // arrival keeps driving the summary.
        if self.last_activity_at.map_or(true, |at| message.created_at > at) {
            self.last_activity_at = Some(message.created_at);
            self.latest = Some(position);
        }
        if let Some(name) = message.contact_name.as_deref() {
            self.note_contact_name(name, message.created_at);
        }

        self.by_id.insert(message.id.clone(), position);
        self.messages.push(message);
    }

    /// Record a counterpart display name observed on a message with the
    /// given timestamp. The name from the newest-stamped message wins.
    pub(crate) fn note_contact_name(&mut self, name: &str, at: DateTime<Utc>) {
        if name.is_empty() {
            return;
        }
        if self.name_noted_at.map_or(true, |noted| at > noted) {
            self.display_name = Some(name.to_string());
            self.name_noted_at = Some(at);
        }
    }

    pub(crate) fn message_mut(&mut self, id: &MessageId) -> Option<&mut MessageState> {
        let position = *self.by_id.get(id)?;
        self.messages.get_mut(position)
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> &[MessageState] {
        &self.messages
    }

    pub fn message(&self, id: &MessageId) -> Option<&MessageState> {
        self.by_id.get(id).and_then(|&position| self.messages.get(position))
    }

    /// Best-known human name for the counterpart, falling back to the key.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.key.as_str())
    }

    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at
    }

    /// The message with the greatest `created_at` (first arrival wins ties).
    pub fn latest_message(&self) -> Option<&MessageState> {
        self.latest.and_then(|position| self.messages.get(position))
    }

    /// True once at least one incoming message exists.
    pub fn has_counterpart_responded(&self) -> bool {
        self.has_counterpart_responded
    }
}

/// A delivery status observed before its message. Kept until the message
/// arrives or the entry is evicted by the retention window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatus {
    pub status: DeliveryStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// The full reconciled state folded out of an event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerState {
    pub(crate) conversations: HashMap<ConversationKey, ConversationState>,
    /// Which conversation each known message id lives in. An id never
    /// appears in two conversations.
    pub(crate) locations: HashMap<MessageId, ConversationKey>,
    /// Provider-assigned alternate id -> canonical id.
    pub(crate) provider_ids: HashMap<String, MessageId>,
    /// Statuses whose message has not been observed yet, keyed by the raw
    /// reference they carried.
    pub(crate) pending: HashMap<String, PendingStatus>,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self, key: &ConversationKey) -> Option<&ConversationState> {
        self.conversations.get(key)
    }

    pub fn conversations(&self) -> impl Iterator<Item = &ConversationState> {
        self.conversations.values()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.locations.len()
    }

    pub fn contains_message(&self, id: &MessageId) -> bool {
        self.locations.contains_key(id)
    }

    /// Look up a message anywhere in the state.
    pub fn message(&self, id: &MessageId) -> Option<&MessageState> {
        let key = self.locations.get(id)?;
        self.conversations.get(key)?.message(id)
    }

    /// Number of buffered statuses still waiting for their message.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
