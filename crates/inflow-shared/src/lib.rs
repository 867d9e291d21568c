//! # inflow-shared
//!
//! Domain vocabulary shared by every Inflow crate: message and conversation
//! identifiers, delivery statuses, the normalized event records produced by
//! the transport adapters, and the tuning constants used across the
//! workspace.
//!
//! Nothing in this crate performs I/O; it is plain data plus a few small
//! helpers.

pub mod constants;
pub mod event;
pub mod types;

mod error;

pub use error::RejectReason;
pub use event::{InboxEvent, MessageEvent, StatusEvent};
pub use types::{ConversationKey, DeliveryStatus, Direction, MessageId, MessageKind};
