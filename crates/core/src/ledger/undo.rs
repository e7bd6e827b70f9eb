//! Compensating undo operations.
//!
//! Every entity-state write a workflow performs alongside a transaction
//! records a tagged undo variant. Undo operations are replayed in reverse
//! order under a fresh database transaction; each individual operation is
//! idempotent.

use serde::{Deserialize, Serialize};

use farebox_shared::types::{PromotionId, RoutePassId, TicketId};

use super::types::{RoutePassStatus, TicketStatus};

/// A single compensating action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoOp {
    /// Mark a ticket created by an aborted sale as failed.
    MarkTicketFailed {
        /// The ticket to fail.
        ticket_id: TicketId,
    },
    /// Restore a ticket to the status it held before the workflow ran.
    RestoreTicketStatus {
        /// The ticket to restore.
        ticket_id: TicketId,
        /// Status held before the workflow.
        prior: TicketStatus,
    },
    /// Mark a route pass created by an aborted purchase as failed.
    MarkRoutePassFailed {
        /// The pass to fail.
        pass_id: RoutePassId,
    },
    /// Restore a route pass to the status it held before the workflow ran.
    RestoreRoutePassStatus {
        /// The pass to restore.
        pass_id: RoutePassId,
        /// Status held before the workflow.
        prior: RoutePassStatus,
    },
    /// Return a consumed promotion use.
    RestorePromotionUsage {
        /// The promotion whose counter was bumped.
        promotion_id: PromotionId,
    },
}

/// An entity status write deferred until the transaction persists.
///
/// Status changes run as post-build hooks inside the same database
/// transaction, after the journal entry and its items are inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    /// Set a ticket's status.
    Ticket {
        /// The ticket to update.
        ticket_id: TicketId,
        /// The status to set.
        status: TicketStatus,
    },
    /// Set a route pass's status.
    RoutePass {
        /// The pass to update.
        pass_id: RoutePassId,
        /// The status to set.
        status: RoutePassStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_ops_are_serializable() {
        let op = UndoOp::RestoreRoutePassStatus {
            pass_id: RoutePassId::new(),
            prior: RoutePassStatus::Valid,
        };
        let json = serde_json::to_string(&op).unwrap();
        let back: UndoOp = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
