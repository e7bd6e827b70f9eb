//! Refund amount validation.
//!
//! The platform's refund policy is all-or-nothing per ticket: the
//! requested amount must equal the sale credit minus any discount that
//! was applied to that ticket, and cumulative refunds may never exceed
//! that remainder.

use farebox_shared::AppError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Tolerance for the all-or-nothing equality check.
const FULL_VALUE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Errors raised by refund amount validation.
#[derive(Debug, Error)]
pub enum RefundRuleError {
    /// The platform only refunds the full post-discount ticket value.
    #[error("requires requested refund to equal ticket value after discounts (requested {requested}, value {value})")]
    RequiresFullValue {
        /// Amount the caller asked to refund.
        requested: Decimal,
        /// Post-discount value of the ticket.
        value: Decimal,
    },

    /// Cumulative refunds would exceed what was originally paid.
    #[error("refund {requested} exceeds remaining refundable amount {remaining}")]
    ExceedsRemaining {
        /// Amount the caller asked to refund.
        requested: Decimal,
        /// What is still refundable.
        remaining: Decimal,
    },
}

impl From<RefundRuleError> for AppError {
    fn from(err: RefundRuleError) -> Self {
        Self::TransactionRule(err.to_string())
    }
}

/// Validates a requested ticket or route-pass refund amount.
///
/// `sale_credit` is the original sale line's credit, `discount_value` the
/// cumulative discount recorded on the item, `previously_refunded` the sum
/// of earlier refund debits against it.
///
/// # Errors
///
/// Returns an error when the request is not the full post-discount value
/// or would exceed the remaining refundable amount.
pub fn validate_refund_amounts(
    sale_credit: Decimal,
    discount_value: Decimal,
    previously_refunded: Decimal,
    requested: Decimal,
) -> Result<(), RefundRuleError> {
    let value_after_discount = sale_credit - discount_value;

    if (requested - value_after_discount).abs() > FULL_VALUE_EPSILON {
        return Err(RefundRuleError::RequiresFullValue {
            requested,
            value: value_after_discount,
        });
    }

    let remaining = value_after_discount - previously_refunded;
    if requested > remaining + FULL_VALUE_EPSILON {
        return Err(RefundRuleError::ExceedsRemaining {
            requested,
            remaining,
        });
    }

    Ok(())
}
