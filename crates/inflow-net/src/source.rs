//! Event source task with tokio mpsc command/notification pattern.
//!
//! The task owns the polling loop and the injected push channel and runs in
//! a dedicated tokio task. External code communicates with it through typed
//! command and notification channels; both transports come out normalized
//! into the same [`InboxEvent`] feed, in delivery order.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use inflow_shared::constants::SOURCE_CHANNEL_CAPACITY;
use inflow_shared::InboxEvent;

use crate::api::HttpApi;
use crate::config::SourceConfig;
use crate::error::{NetError, Result};
use crate::push::{decode_frame, PushFrame};
use crate::snapshot::{normalize, SnapshotRecord};

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the source task.
#[derive(Debug)]
pub enum SourceCommand {
    /// Poll the snapshot endpoint now instead of waiting for the next tick.
    PollNow,
    /// Gracefully shut down the source.
    Shutdown,
}

/// Notifications sent *from* the source task to the application.
#[derive(Debug, Clone)]
pub enum SourceNotification {
    /// A full snapshot poll completed.
    Snapshot {
        events: Vec<InboxEvent>,
        /// Records that failed validation and were skipped.
        skipped: usize,
    },
    /// A single live event arrived on the push channel.
    Live(InboxEvent),
    /// A snapshot poll failed. Nothing was delivered; the next tick
    /// retries, so reconciled state stays untouched.
    PollFailed { error: String },
}

/// Spawn the event source in a background tokio task.
///
/// `push_rx` is the receiving half of the live-update connection, owned and
/// injected by the caller. Returns channels for sending commands and
/// receiving notifications.
pub fn spawn_source(
    api: HttpApi,
    mut push_rx: mpsc::Receiver<PushFrame>,
    config: SourceConfig,
) -> (
    mpsc::Sender<SourceCommand>,
    mpsc::Receiver<SourceNotification>,
) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
    let (notif_tx, notif_rx) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut push_open = true;

        info!(
            base_url = %api.base_url(),
            interval = ?config.poll_interval,
            "Event source started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !deliver_poll(&api, &notif_tx).await {
                        break;
                    }
                }
                command = cmd_rx.recv() => {
                    match command {
                        Some(SourceCommand::PollNow) => {
                            if !deliver_poll(&api, &notif_tx).await {
                                break;
                            }
                        }
                        Some(SourceCommand::Shutdown) | None => {
                            debug!("Event source shutting down");
                            break;
                        }
                    }
                }
                frame = push_rx.recv(), if push_open => {
                    match frame {
                        Some(frame) => {
                            if !deliver_frame(frame, &notif_tx).await {
                                break;
                            }
                        }
                        None => {
                            debug!("Push channel closed; polling only");
                            push_open = false;
                        }
                    }
                }
            }
        }
    });

    (cmd_tx, notif_rx)
}

/// Poll and forward the result. Returns false once the notification
/// receiver is gone and the task should stop.
async fn deliver_poll(api: &HttpApi, notif_tx: &mpsc::Sender<SourceNotification>) -> bool {
    let notification = match poll_once(api).await {
        Ok((events, skipped)) => SourceNotification::Snapshot { events, skipped },
        Err(error) => {
            warn!(error = %error, "Snapshot poll failed");
            SourceNotification::PollFailed {
                error: error.to_string(),
            }
        }
    };
    notif_tx.send(notification).await.is_ok()
}

async fn deliver_frame(frame: PushFrame, notif_tx: &mpsc::Sender<SourceNotification>) -> bool {
    match decode_frame(&frame, Utc::now()) {
        Ok(event) => notif_tx.send(SourceNotification::Live(event)).await.is_ok(),
        Err(error) => {
            warn!(event = %frame.event, error = %error, "Skipping malformed push frame");
            true
        }
    }
}

/// Fetch and normalize one snapshot. Malformed records are counted and
/// skipped rather than failing the batch.
async fn poll_once(api: &HttpApi) -> Result<(Vec<InboxEvent>, usize)> {
    let records = api.list_messages().await?;

    let mut events = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for value in records {
        let decoded = serde_json::from_value::<SnapshotRecord>(value)
            .map_err(NetError::from)
            .and_then(|record| normalize(record).map_err(NetError::from));
        match decoded {
            Ok(event) => events.push(event),
            Err(error) => {
                warn!(error = %error, "Skipping malformed snapshot record");
                skipped += 1;
            }
        }
    }

    debug!(
        events = events.len(),
        skipped, "Snapshot poll normalized"
    );
    Ok((events, skipped))
}
