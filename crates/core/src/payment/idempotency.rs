//! Idempotency key formats.
//!
//! Every charge and refund call carries a key the gateway uses to make
//! repeated requests observationally equivalent to a single request. The
//! instance tag is a launch-time constant distinguishing deployments.

use farebox_shared::types::{RoutePassId, TicketId, TransactionId};

/// What a refund key is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundTarget {
    /// Refund of a ticket.
    Ticket(TicketId),
    /// Refund of a route pass.
    RoutePass(RoutePassId),
}

/// Key for charging a booking: one charge per transaction per session.
#[must_use]
pub fn booking_key(instance_tag: &str, transaction_id: TransactionId, session_iat: i64) -> String {
    format!("instance={instance_tag},bookingId={transaction_id},session={session_iat}")
}

/// Key for refunding a ticket or route pass: one refund per entity.
#[must_use]
pub fn refund_key(instance_tag: &str, target: RefundTarget) -> String {
    match target {
        RefundTarget::Ticket(id) => {
            format!("Refund:instance={instance_tag},ticketId={id}")
        }
        RefundTarget::RoutePass(id) => {
            format!("Refund:instance={instance_tag},routePassId={id}")
        }
    }
}
