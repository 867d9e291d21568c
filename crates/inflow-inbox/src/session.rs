//! The inbox session: one operator's live view of the conversation map.
//!
//! Owns the reconciled state and the channels to the event source task.
//! Snapshot batches and live events are folded in through the same engine
//! path, so a session driven by polling, by push, or by both converges on
//! the same state.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use inflow_engine::{project, InboxView};
use inflow_net::{
    spawn_source, HttpApi, PushFrame, SourceCommand, SourceConfig, SourceNotification,
};
use inflow_shared::{ConversationKey, InboxEvent, MessageId};

use crate::error::{InboxError, Result};
use crate::state::InboxState;

pub struct InboxSession {
    state: InboxState,
    api: HttpApi,
    cmd_tx: mpsc::Sender<SourceCommand>,
    notifications: mpsc::Receiver<SourceNotification>,
    pending_retention: Duration,
}

impl InboxSession {
    /// Start a session: spawns the event source against `config.base_url`
    /// with the given (externally owned) push channel.
    pub fn start(push_rx: mpsc::Receiver<PushFrame>, config: SourceConfig) -> Self {
        let api = HttpApi::new(config.base_url.clone());
        let pending_retention = Duration::from_std(config.pending_retention)
            .unwrap_or_else(|_| Duration::seconds(900));
        let (cmd_tx, notifications) = spawn_source(api.clone(), push_rx, config);

        info!(base_url = %api.base_url(), "Inbox session started");

        Self {
            state: InboxState::new(),
            api,
            cmd_tx,
            notifications,
            pending_retention,
        }
    }

    /// Ask the source to poll the snapshot endpoint now. The result arrives
    /// as a notification on the next [`pump`](Self::pump) or
    /// [`next_change`](Self::next_change).
    pub async fn refresh(&mut self) -> Result<()> {
        self.cmd_tx
            .send(SourceCommand::PollNow)
            .await
            .map_err(|_| InboxError::SourceClosed)
    }

    /// Drain every notification currently queued and fold it in. Returns
    /// the number of events applied. Non-blocking; suited to a UI tick.
    pub fn pump(&mut self, now: DateTime<Utc>) -> usize {
        let mut applied = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            applied += self.absorb(notification, now);
        }
        self.state
            .reconciler
            .evict_pending_before(now - self.pending_retention);
        applied
    }

    /// Wait for the next notification and fold it in. Returns the number of
    /// events applied, or an error once the source has terminated.
    pub async fn next_change(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let notification = self
            .notifications
            .recv()
            .await
            .ok_or(InboxError::SourceClosed)?;
        let applied = self.absorb(notification, now);
        self.state
            .reconciler
            .evict_pending_before(now - self.pending_retention);
        Ok(applied)
    }

    /// Send a text message and merge the confirmed result immediately,
    /// ahead of the next poll. On failure nothing is inserted and the error
    /// surfaces to the caller.
    pub async fn send_text(&mut self, to: &ConversationKey, body: &str) -> Result<MessageId> {
        let message = self.api.send_text(to.as_str(), body).await?;
        let id = message.id.clone();

        debug!(id = %id, to = %to, "Send confirmed; merging optimistically");
        self.state.reconciler.apply_event(InboxEvent::Message(message));
        Ok(id)
    }

    /// The projected view consumed by the display layer.
    pub fn view(&self) -> InboxView {
        project(&self.state.reconciler)
    }

    pub fn state(&self) -> &InboxState {
        &self.state
    }

    /// Shut the event source down. Notifications already queued can still
    /// be pumped.
    pub async fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(SourceCommand::Shutdown).await;
    }

    fn absorb(&mut self, notification: SourceNotification, now: DateTime<Utc>) -> usize {
        match notification {
            SourceNotification::Snapshot { events, skipped } => {
                if skipped > 0 {
                    warn!(skipped, "Snapshot contained malformed records");
                }
                let applied = events.len();
                self.state.reconciler.apply_all(events);
                self.state.last_snapshot_at = Some(now);
                debug!(applied, "Snapshot folded in");
                applied
            }
            SourceNotification::Live(event) => {
                self.state.reconciler.apply_event(event);
                self.state.live_events_applied += 1;
                1
            }
            SourceNotification::PollFailed { error } => {
                // Retryable: state was left untouched, the next tick polls
                // again.
                warn!(error = %error, "Snapshot poll failed");
                0
            }
        }
    }

    #[cfg(test)]
    fn with_channels(
        cmd_tx: mpsc::Sender<SourceCommand>,
        notifications: mpsc::Receiver<SourceNotification>,
    ) -> Self {
        Self {
            state: InboxState::new(),
            api: HttpApi::new("http://127.0.0.1:1"),
            cmd_tx,
            notifications,
            pending_retention: Duration::seconds(900),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use inflow_shared::{DeliveryStatus, Direction, MessageEvent, MessageKind, StatusEvent};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(10_000, 0).unwrap()
    }

    fn message(id: &str, key: &str, secs: i64) -> InboxEvent {
        InboxEvent::Message(MessageEvent {
            id: id.into(),
            provider_id: None,
            conversation: key.into(),
            direction: Direction::Incoming,
            kind: MessageKind::Text,
            body: Some("hi".to_string()),
            contact_name: None,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            status: None,
        })
    }

    fn harness() -> (mpsc::Sender<SourceNotification>, InboxSession) {
        let (notif_tx, notif_rx) = mpsc::channel(16);
        let (cmd_tx, _cmd_rx) = mpsc::channel(16);
        (notif_tx, InboxSession::with_channels(cmd_tx, notif_rx))
    }

    #[tokio::test]
    async fn test_pump_folds_snapshot_and_live_events() {
        let (notif_tx, mut session) = harness();

        notif_tx
            .send(SourceNotification::Snapshot {
                events: vec![message("m1", "+1555", 100), message("m2", "+1777", 200)],
                skipped: 0,
            })
            .await
            .unwrap();
        notif_tx
            .send(SourceNotification::Live(message("m3", "+1555", 300)))
            .await
            .unwrap();

        let applied = session.pump(now());
        assert_eq!(applied, 3);
        assert_eq!(session.state().reconciler.message_count(), 3);
        assert_eq!(session.state().live_events_applied, 1);
        assert!(session.state().last_snapshot_at.is_some());

        let view = session.view();
        assert_eq!(view.conversations.len(), 2);
        assert_eq!(view.conversations[0].key, "+1555".into());
    }

    #[tokio::test]
    async fn test_poll_failure_leaves_state_untouched() {
        let (notif_tx, mut session) = harness();

        notif_tx
            .send(SourceNotification::Snapshot {
                events: vec![message("m1", "+1555", 100)],
                skipped: 0,
            })
            .await
            .unwrap();
        session.pump(now());
        let before = session.state().reconciler.clone();

        notif_tx
            .send(SourceNotification::PollFailed {
                error: "connection refused".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.pump(now()), 0);
        assert_eq!(session.state().reconciler, before);
    }

    #[tokio::test]
    async fn test_pump_evicts_stale_pending_statuses() {
        let (notif_tx, mut session) = harness();

        // A status whose message never arrives, observed far in the past.
        notif_tx
            .send(SourceNotification::Live(InboxEvent::Status(StatusEvent {
                message_ref: "ghost".to_string(),
                provider_ref: None,
                status: DeliveryStatus::Sent,
                observed_at: Utc.timestamp_opt(100, 0).unwrap(),
            })))
            .await
            .unwrap();

        session.pump(now());
        assert_eq!(session.state().reconciler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_pending_status_survives_pump() {
        let (notif_tx, mut session) = harness();

        notif_tx
            .send(SourceNotification::Live(InboxEvent::Status(StatusEvent {
                message_ref: "soon".to_string(),
                provider_ref: None,
                status: DeliveryStatus::Sent,
                observed_at: now(),
            })))
            .await
            .unwrap();

        session.pump(now());
        assert_eq!(session.state().reconciler.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_live_path_matches_snapshot_refold() {
        // The incremental path over (snapshot + live events) must equal one
        // flat fold over the concatenated sequence.
        let events = vec![
            message("m1", "+1555", 100),
            message("m2", "+1777", 200),
            InboxEvent::Status(StatusEvent {
                message_ref: "m1".to_string(),
                provider_ref: None,
                status: DeliveryStatus::Read,
                observed_at: Utc.timestamp_opt(300, 0).unwrap(),
            }),
        ];

        let (notif_tx, mut session) = harness();
        notif_tx
            .send(SourceNotification::Snapshot {
                events: events[..1].to_vec(),
                skipped: 0,
            })
            .await
            .unwrap();
        for event in &events[1..] {
            notif_tx
                .send(SourceNotification::Live(event.clone()))
                .await
                .unwrap();
        }
        session.pump(now());

        assert_eq!(
            session.state().reconciler,
            inflow_engine::reconcile(events)
        );
    }

    #[tokio::test]
    async fn test_session_against_spawned_source() {
        // End to end with a real source task: the backend is unreachable
        // (polls fail harmlessly) and a push frame drives the state.
        let (push_tx, push_rx) = mpsc::channel(8);
        let config = SourceConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            poll_interval: std::time::Duration::from_secs(3600),
            ..SourceConfig::default()
        };
        let mut session = InboxSession::start(push_rx, config);

        push_tx
            .send(PushFrame {
                event: "new_message".to_string(),
                payload: json!({
                    "id": "m1",
                    "chatId": "+1555",
                    "senderId": "+1555",
                    "text": "hi",
                    "createdAt": "2024-05-01T12:00:00Z",
                }),
            })
            .await
            .unwrap();

        while session.state().reconciler.message_count() == 0 {
            session.next_change(now()).await.unwrap();
        }

        let view = session.view();
        assert_eq!(view.conversations.len(), 1);
        assert!(view.conversations[0].has_counterpart_responded);

        session.shutdown().await;
    }
}
