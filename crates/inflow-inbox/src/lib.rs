//! # inflow-inbox
//!
//! Operator-facing session layer tying the event source to the
//! reconciliation engine. The session exclusively owns the reconciled state,
//! drains source notifications into it, performs sends with an optimistic
//! merge, and exposes the projected view (never the internal state) to the
//! display layer.

pub mod session;
pub mod state;

mod error;

pub use error::InboxError;
pub use session::InboxSession;
pub use state::InboxState;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing for an embedding application.
///
/// Honors `RUST_LOG` when set; defaults to debug-level logging for the
/// inflow crates and warnings for everything else.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("inflow_inbox=debug,inflow_net=debug,inflow_engine=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
