//! Domain types shared by the ledger and its workflows.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    /// Sale of one or more trip tickets.
    TicketPurchase,
    /// Sale of prepaid route passes.
    RoutePassPurchase,
    /// Refund of a previous purchase.
    RefundPayment,
}

/// Ticket lifecycle status.
///
/// Tickets are created `Pending` during a sale, become `Valid` when the
/// transaction commits, and move to `Refunded` or `Failed` via workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Created during a sale, not yet paid for.
    Pending,
    /// Paid for and usable.
    Valid,
    /// Administratively voided.
    Void,
    /// Sale did not complete (gateway decline, rollback).
    Failed,
    /// Refunded to the purchaser.
    Refunded,
}

/// Route-pass lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePassStatus {
    /// Purchased and redeemable.
    Valid,
    /// Redeemed against a ticket.
    Void,
    /// Past its expiry date.
    Expired,
    /// Refunded to the purchaser.
    Refunded,
    /// Purchase did not complete.
    Failed,
}

impl RoutePassStatus {
    /// Returns true if a pass in this status may be refunded.
    #[must_use]
    pub fn is_refundable(self) -> bool {
        matches!(self, Self::Valid | Self::Void | Self::Expired)
    }
}

/// The scope of the identity that created a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatorScope {
    /// End user booking for themselves.
    User,
    /// Company administrator.
    Admin,
    /// Platform operator.
    Superadmin,
    /// Driver device.
    Driver,
    /// Automated platform process.
    System,
}

/// The identity a transaction is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Identity scope.
    pub scope: CreatorScope,
    /// Identifier within the scope, when one exists.
    pub id: Option<Uuid>,
}

impl Creator {
    /// A platform-initiated creator with no backing identity.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            scope: CreatorScope::System,
            id: None,
        }
    }

    /// A user-scoped creator.
    #[must_use]
    pub const fn user(id: Uuid) -> Self {
        Self {
            scope: CreatorScope::User,
            id: Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_pass_refundable() {
        assert!(RoutePassStatus::Valid.is_refundable());
        assert!(RoutePassStatus::Void.is_refundable());
        assert!(RoutePassStatus::Expired.is_refundable());
        assert!(!RoutePassStatus::Refunded.is_refundable());
        assert!(!RoutePassStatus::Failed.is_refundable());
    }

    #[test]
    fn test_transaction_type_serde_names() {
        let json = serde_json::to_string(&TransactionType::TicketPurchase).unwrap();
        assert_eq!(json, "\"ticketPurchase\"");
        let json = serde_json::to_string(&TransactionType::RoutePassPurchase).unwrap();
        assert_eq!(json, "\"routePassPurchase\"");
    }
}
