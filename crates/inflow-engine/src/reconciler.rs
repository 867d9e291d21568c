//! Folding raw events into reconciled conversations.
//!
//! The fold consumes events in delivered order but does not assume any
//! global temporal ordering between message and status events: a status may
//! arrive before the message it refers to, and duplicates are expected under
//! at-least-once delivery. [`ReconcilerState::apply_event`] is the single
//! per-event merge step; [`reconcile`] is its fold from empty state, and the
//! live-update path applies it to existing state; both produce identical
//! results for the same accumulated event sequence.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use inflow_shared::{
    ConversationKey, DeliveryStatus, InboxEvent, MessageEvent, MessageId, StatusEvent,
};

use crate::precedence::resolve;
use crate::state::{ConversationState, MessageState, PendingStatus, ReconcilerState};

/// Fold an event sequence into a fresh state.
pub fn reconcile<I>(events: I) -> ReconcilerState
where
    I: IntoIterator<Item = InboxEvent>,
{
    let mut state = ReconcilerState::new();
    state.apply_all(events);
    state
}

impl ReconcilerState {
    /// Apply a batch of events in order.
    pub fn apply_all<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = InboxEvent>,
    {
        for event in events {
            self.apply_event(event);
        }
    }

    /// Apply a single event.
    ///
    /// This is also the live-update merge: applying one event to
    /// already-reconciled state yields the same state as re-folding the full
    /// history with that event appended. Malformed events are skipped and
    /// logged; they never abort the fold.
    pub fn apply_event(&mut self, event: InboxEvent) {
        if let Err(reason) = event.validate() {
            warn!(reason = %reason, "Skipping malformed event");
            return;
        }
        match event {
            InboxEvent::Message(message) => self.apply_message(message),
            InboxEvent::Status(status) => self.apply_status(status),
        }
    }

    /// Drop buffered statuses not referenced since `cutoff`.
    ///
    /// Late-arriving message events are expected, so unmatched statuses are
    /// retained, but only within a bounded window, enforced by the caller
    /// invoking this with its own clock. Returns the number evicted.
    pub fn evict_pending_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pending| pending.last_seen >= cutoff);
        let evicted = before - self.pending.len();
        if evicted > 0 {
            debug!(evicted, "Evicted stale buffered statuses");
        }
        evicted
    }

    fn apply_message(&mut self, event: MessageEvent) {
        if let Some(key) = self.locations.get(&event.id).cloned() {
            self.refresh_duplicate(&key, event);
            return;
        }

        // Claim any statuses that were observed before this message, under
        // either of its ids.
        let mut buffered = self.pending.remove(event.id.as_str());
        if let Some(provider_id) = event.provider_id.as_deref() {
            if let Some(extra) = self.pending.remove(provider_id) {
                buffered = Some(match buffered {
                    None => extra,
                    Some(existing) => merge_pending(existing, extra),
                });
            }
            self.provider_ids
                .entry(provider_id.to_string())
                .or_insert_with(|| event.id.clone());
        }

        let mut status = event.status;
        if let Some(pending) = buffered {
            status = Some(resolve(status, pending.status));
        }

        let message = MessageState {
            id: event.id.clone(),
            provider_id: event.provider_id,
            direction: event.direction,
            kind: event.kind,
            body: event.body,
            contact_name: event.contact_name,
            created_at: event.created_at,
            status,
        };

        let key = event.conversation;
        self.locations.insert(event.id, key.clone());
        self.conversations
            .entry(key.clone())
            .or_insert_with(|| ConversationState::new(key))
            .insert(message);
    }

    /// Idempotent insert: a duplicate never creates a second message, but
    /// full-snapshot polling re-delivers every message with its current
    /// status embedded, so the mutable fields are still merged.
    fn refresh_duplicate(&mut self, key: &ConversationKey, event: MessageEvent) {
        let MessageEvent {
            id,
            provider_id,
            contact_name,
            created_at,
            status,
            ..
        } = event;
        debug!(id = %id, "Duplicate message event; merging mutable fields");

        let mut drained = None;
        if let Some(provider) = provider_id.as_deref() {
            if !self.provider_ids.contains_key(provider) {
                self.provider_ids.insert(provider.to_string(), id.clone());
                drained = self.pending.remove(provider);
            }
        }

        let Some(conv) = self.conversations.get_mut(key) else {
            return;
        };
        if let Some(existing) = conv.message_mut(&id) {
            if existing.provider_id.is_none() {
                existing.provider_id = provider_id;
            }
            if let Some(status) = status {
                existing.status = Some(resolve(existing.status, status));
            }
            if let Some(pending) = drained {
                existing.status = Some(resolve(existing.status, pending.status));
            }
            if existing.contact_name.is_none() {
                existing.contact_name = contact_name.clone();
            }
        }
        if let Some(name) = contact_name.as_deref() {
            conv.note_contact_name(name, created_at);
        }
    }

    fn apply_status(&mut self, event: StatusEvent) {
        let target = self.resolve_ref(&event.message_ref).or_else(|| {
            event
                .provider_ref
                .as_deref()
                .and_then(|reference| self.resolve_ref(reference))
        });

        match target {
            Some(id) => self.advance_status(&id, event.status),
            None => {
                debug!(
                    reference = %event.message_ref,
                    status = %event.status,
                    "Status for unknown message; buffering"
                );
                self.buffer_status(event);
            }
        }
    }

    /// Resolve a raw status reference against the canonical index first,
    /// then the provider-id index.
    fn resolve_ref(&self, reference: &str) -> Option<MessageId> {
        let as_id = MessageId(reference.to_string());
        if self.locations.contains_key(&as_id) {
            return Some(as_id);
        }
        self.provider_ids.get(reference).cloned()
    }

    fn advance_status(&mut self, id: &MessageId, status: DeliveryStatus) {
        let Some(key) = self.locations.get(id).cloned() else {
            return;
        };
        let Some(conv) = self.conversations.get_mut(&key) else {
            return;
        };
        if let Some(message) = conv.message_mut(id) {
            message.status = Some(resolve(message.status, status));
        }
    }

    fn buffer_status(&mut self, event: StatusEvent) {
        use std::collections::hash_map::Entry;

        match self.pending.entry(event.message_ref) {
            Entry::Occupied(mut occupied) => {
                let pending = occupied.get_mut();
                pending.status = resolve(Some(pending.status), event.status);
                pending.first_seen = pending.first_seen.min(event.observed_at);
                pending.last_seen = pending.last_seen.max(event.observed_at);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(PendingStatus {
                    status: event.status,
                    first_seen: event.observed_at,
                    last_seen: event.observed_at,
                });
            }
        }
    }
}

fn merge_pending(a: PendingStatus, b: PendingStatus) -> PendingStatus {
    PendingStatus {
        status: resolve(Some(a.status), b.status),
        first_seen: a.first_seen.min(b.first_seen),
        last_seen: a.last_seen.max(b.last_seen),
    }
}
