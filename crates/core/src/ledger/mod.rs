//! Double-entry ledger logic.
//!
//! This module implements the core ledger functionality:
//! - Typed line items (debits and credits)
//! - The transaction builder that accumulates items into a balanced
//!   journal entry
//! - Proportional discount allocation
//! - Refund amount validation
//! - Compensating undo operations

pub mod allocation;
pub mod builder;
pub mod error;
pub mod item;
pub mod refund;
pub mod types;
pub mod undo;

#[cfg(test)]
mod builder_props;

pub use allocation::{allocate_full_outstanding, allocate_proportional};
pub use builder::{
    SaleDiscount, SaleLine, Settlement, TransactionBuilder, TransactionDraft,
    ABSORB_SMALL_PAYMENTS,
};
pub use error::LedgerError;
pub use item::{ItemType, LineItem, Side};
pub use refund::validate_refund_amounts;
pub use types::{Creator, CreatorScope, RoutePassStatus, TicketStatus, TransactionType};
pub use undo::{StatusChange, UndoOp};
