//! Typed transaction line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of entity or account a line item posts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    /// Revenue from a ticket sale (credit).
    TicketSale,
    /// Reversal of a ticket sale (debit).
    TicketRefund,
    /// Revenue from a route-pass sale (credit), or its reversal (debit).
    RoutePass,
    /// Platform-borne discount (debit).
    Discount,
    /// Card payment captured from, or returned to, the purchaser.
    Payment,
    /// Settlement owed to the transport company.
    Transfer,
    /// General ledger account posting (cost of goods sold).
    Account,
}

/// Whether a line item is a debit or a credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

/// A single line item in a transaction.
///
/// Amounts are non-negative; the side carries the sign. A transaction's
/// items must sum to zero (debits equal credits) before it can be built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// What the line posts against.
    pub item_type: ItemType,
    /// The entity the line references (ticket, pass, payment, …), when any.
    pub item_id: Option<Uuid>,
    /// Debit or credit.
    pub side: Side,
    /// Non-negative amount in dollars.
    pub amount: Decimal,
    /// Free-form annotations carried onto the persisted item.
    pub notes: Option<serde_json::Value>,
}

impl LineItem {
    /// Creates a debit line.
    #[must_use]
    pub fn debit(item_type: ItemType, item_id: Option<Uuid>, amount: Decimal) -> Self {
        Self {
            item_type,
            item_id,
            side: Side::Debit,
            amount,
            notes: None,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub fn credit(item_type: ItemType, item_id: Option<Uuid>, amount: Decimal) -> Self {
        Self {
            item_type,
            item_id,
            side: Side::Credit,
            amount,
            notes: None,
        }
    }

    /// Attaches notes to the line.
    #[must_use]
    pub fn with_notes(mut self, notes: serde_json::Value) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.side {
            Side::Debit => self.amount,
            Side::Credit => -self.amount,
        }
    }

    /// Returns the debit amount, zero for credit lines.
    #[must_use]
    pub fn debit_amount(&self) -> Decimal {
        match self.side {
            Side::Debit => self.amount,
            Side::Credit => Decimal::ZERO,
        }
    }

    /// Returns the credit amount, zero for debit lines.
    #[must_use]
    pub fn credit_amount(&self) -> Decimal {
        match self.side {
            Side::Credit => self.amount,
            Side::Debit => Decimal::ZERO,
        }
    }
}
