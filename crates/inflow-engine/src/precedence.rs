//! Delivery-status precedence.
//!
//! Status callbacks from the channel are not ordered: a late `sent` can
//! arrive after `read`. A candidate status only replaces the current one if
//! it outranks it, and `failed` is sticky once applied.

use inflow_shared::DeliveryStatus;

/// Decide which status survives when a new observation arrives.
///
/// Returns `incoming` if its rank is strictly greater than the current one
/// (a missing current status ranks below everything) and the current status
/// is not terminal; otherwise returns `current`.
pub fn resolve(
    current: Option<DeliveryStatus>,
    incoming: DeliveryStatus,
) -> DeliveryStatus {
    match current {
        None => incoming,
        Some(current) => {
            if current.is_terminal() {
                current
            } else if incoming.rank() > current.rank() {
                incoming
            } else {
                current
            }
        }
    }
}
