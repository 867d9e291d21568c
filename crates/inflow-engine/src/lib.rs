//! # inflow-engine
//!
//! Turns a flat, possibly out-of-order stream of message and delivery-status
//! events into ordered, deduplicated conversations suitable for display.
//!
//! The engine is a pure-data transform: state is threaded explicitly through
//! every call, nothing here suspends or touches a clock, and applying a
//! single event to already-reconciled state yields exactly the same result
//! as re-folding the full event history. Bad input is skipped and logged,
//! never fatal; the feed comes from a third-party channel that cannot be
//! trusted to be well-formed or ordered.

pub mod precedence;
pub mod project;
pub mod reconciler;
pub mod state;

pub use precedence::resolve;
pub use project::{project, ConversationView, InboxView, MessageView};
pub use reconciler::reconcile;
pub use state::{ConversationState, MessageState, PendingStatus, ReconcilerState};
