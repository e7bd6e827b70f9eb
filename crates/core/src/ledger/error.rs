//! Ledger error types for build-time invariant violations.

use farebox_shared::types::{CompanyId, TicketId};
use farebox_shared::AppError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while assembling or building a transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Debits and credits do not cancel out.
    #[error("Transaction is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// A line item carries a negative amount.
    #[error("Line item amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    /// A ticket may appear at most once per transaction.
    #[error("Ticket {0} already appears in this transaction")]
    DuplicateTicket(TicketId),

    /// All items in one transaction must settle against one company.
    #[error("Transaction spans multiple companies: {existing} and {got}")]
    MultipleCompanies {
        /// The company already bound to the transaction.
        existing: CompanyId,
        /// The conflicting company.
        got: CompanyId,
    },

    /// A discount allocation does not line up with the sale items.
    #[error("Discount allocation count {got} does not match {expected} sale items")]
    AllocationMismatch {
        /// Number of sale items in the builder.
        expected: usize,
        /// Number of allocations supplied.
        got: usize,
    },

    /// A discount allocation exceeds the item's outstanding amount.
    #[error("Discount {allocation} exceeds outstanding amount {outstanding}")]
    DiscountExceedsOutstanding {
        /// The attempted allocation.
        allocation: Decimal,
        /// The item's remaining outstanding amount.
        outstanding: Decimal,
    },

    /// The final payable differs from what the caller quoted.
    #[error("priceChanged: expected {expected}, computed {actual}")]
    PriceChanged {
        /// Price the caller was quoted.
        expected: Decimal,
        /// Price the builder computed.
        actual: Decimal,
    },

    /// Finalize was called before any sale items were added.
    #[error("Transaction has no sale items to finalize")]
    NoSaleItems,

    /// Finalize may only run once per builder.
    #[error("Transaction has already been finalized for payment")]
    AlreadyFinalized,

    /// The counterparty company is not determined yet.
    #[error("Transaction has no counterparty company")]
    NoCompany,
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            // Caller-recoverable business rule violations.
            LedgerError::DuplicateTicket(_)
            | LedgerError::MultipleCompanies { .. }
            | LedgerError::PriceChanged { .. }
            | LedgerError::NoSaleItems => Self::TransactionRule(err.to_string()),
            // Everything else means the engine itself built bad state.
            _ => Self::Internal(err.to_string()),
        }
    }
}
