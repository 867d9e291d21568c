//! Session state owned by the embedding application.

use chrono::{DateTime, Utc};
use inflow_engine::ReconcilerState;

/// Everything the session accumulates across refreshes.
///
/// Held exclusively by [`crate::InboxSession`]; the display layer only ever
/// sees projections of it.
#[derive(Debug, Clone, Default)]
pub struct InboxState {
    /// The reconciled conversation map.
    pub reconciler: ReconcilerState,

    /// When the last successful snapshot was folded in.
    pub last_snapshot_at: Option<DateTime<Utc>>,

    /// Live events applied since the session started.
    pub live_events_applied: u64,
}

impl InboxState {
    pub fn new() -> Self {
        Self::default()
    }
}
