//! Refund sizing against a gateway charge.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use farebox_shared::types::{cents_to_dollars, dollars_to_cents};
use farebox_shared::AppError;

use super::fees::{admin_fee_cents, is_local_and_non_amex};
use super::gateway::Charge;

/// Everything a workflow needs to execute and book a gateway refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Gateway fee the platform does not recover, in dollars.
    pub processing_fee: Decimal,
    /// The charge being refunded.
    pub charge: Charge,
    /// Whether the original charge used the micro fee schedule.
    pub is_micro: bool,
    /// Remaining refundable balance before this refund, in cents.
    pub balance_amt_cents: i64,
    /// Refund amount in dollars.
    pub amount: Decimal,
    /// Idempotency key for the gateway refund call.
    pub idempotency_key: String,
}

/// Refund sizing failures.
#[derive(Debug, Error)]
pub enum RefundInfoError {
    /// The charge's remaining balance does not cover the refund.
    #[error(
        "Charge {charge_id} balance {balance_cents}c does not cover refund of {requested_cents}c"
    )]
    InsufficientBalance {
        /// The charge.
        charge_id: String,
        /// Remaining balance in cents.
        balance_cents: i64,
        /// Requested refund in cents.
        requested_cents: i64,
    },
}

impl From<RefundInfoError> for AppError {
    fn from(err: RefundInfoError) -> Self {
        Self::TransactionRule(err.to_string())
    }
}

/// Sizes a refund against a charge.
///
/// Verifies the charge's remaining balance covers the amount (with a
/// tenth-of-a-cent tolerance for upstream rounding) and computes the
/// processing-fee delta `fee(balance before) - fee(balance after)`, the
/// slice of the original fee the gateway returns along with the refund.
/// The platform keeps absorbing the rest.
///
/// # Errors
///
/// Returns `InsufficientBalance` when the charge cannot cover the amount.
pub fn generate_refund_info(
    charge: Charge,
    amount: Decimal,
    micro: bool,
    home_country: &str,
    idempotency_key: String,
) -> Result<RefundInfo, RefundInfoError> {
    let balance_cents = charge.balance_cents();
    let amount_cents = amount * Decimal::from(100);
    let tolerance = Decimal::new(1, 1); // 0.1 cent

    if Decimal::from(balance_cents) < amount_cents - tolerance {
        return Err(RefundInfoError::InsufficientBalance {
            charge_id: charge.id.clone(),
            balance_cents,
            requested_cents: dollars_to_cents(amount),
        });
    }

    let local = is_local_and_non_amex(&charge.source, home_country);
    let balance_after = balance_cents - dollars_to_cents(amount);
    let fee_delta_cents =
        admin_fee_cents(balance_cents, micro, local) - admin_fee_cents(balance_after, micro, local);

    Ok(RefundInfo {
        processing_fee: cents_to_dollars(fee_delta_cents.max(0)),
        charge,
        is_micro: micro,
        balance_amt_cents: balance_cents,
        amount,
        idempotency_key,
    })
}
