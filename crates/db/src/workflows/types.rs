//! Workflow input and output types.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseTransaction;

use farebox_core::auth::Credentials;
use farebox_core::booking::{BookingFlags, TripOrder};
use farebox_core::ledger::{Creator, TransactionDraft, TransactionType};
use farebox_core::payment::{CardSource, RefundInfo};
use farebox_shared::types::{
    CompanyId, PaymentId, RoutePassId, TicketId, TransactionId, UserId,
};
use farebox_shared::{AppError, AppResult};

use crate::repositories::transactions::TransactionWithItems;

use super::undo::UndoPlan;

/// A hook run inside the purchase's database transaction, after the
/// journal entry persists and before commit.
pub type PostTransactionHook = Box<
    dyn for<'a> FnOnce(
            &'a DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'a>>
        + Send,
>;

/// Input for `prepare_ticket_sale`.
#[derive(Debug, Clone)]
pub struct TicketSaleInput {
    /// The trip legs to book. All legs must share one purchaser.
    pub trips: Vec<TripOrder>,
    /// Optional promo code.
    pub promo_code: Option<String>,
    /// Build without persisting or charging.
    pub dry_run: bool,
    /// Redeem the purchaser's route passes against matching trips.
    pub apply_route_pass: bool,
    /// Which booking checks run.
    pub checks: BookingFlags,
    /// Price the caller was quoted; the sale fails if it drifts.
    pub expected_price: Option<Decimal>,
    /// Identity the transaction is recorded against.
    pub creator: Creator,
    /// Whether the transaction commits immediately.
    pub committed: bool,
    /// Transaction classification.
    pub transaction_type: TransactionType,
    /// Optional description.
    pub description: Option<String>,
}

impl TicketSaleInput {
    /// Validates the option bag.
    ///
    /// # Errors
    ///
    /// Returns `Validation` on an empty cart, mixed purchasers, or a
    /// negative expected price.
    pub fn validate(&self) -> AppResult<()> {
        if self.trips.is_empty() {
            return Err(AppError::Validation("trips must not be empty".to_string()));
        }
        let first_user = self.trips[0].user_id;
        if self.trips.iter().any(|t| t.user_id != first_user) {
            return Err(AppError::Validation(
                "all trips in one sale must share a purchaser".to_string(),
            ));
        }
        if self.expected_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(AppError::Validation(
                "expectedPrice must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// The single purchaser across the cart.
    #[must_use]
    pub fn purchaser(&self) -> UserId {
        self.trips[0].user_id
    }
}

/// Result of a prepared (and possibly persisted) ticket sale.
#[derive(Debug)]
pub struct PreparedSale {
    /// Id the transaction was (or would be) persisted under.
    pub transaction_id: TransactionId,
    /// The balanced journal entry.
    pub draft: TransactionDraft,
    /// The persisted rows; `None` on a dry run.
    pub persisted: Option<TransactionWithItems>,
    /// The payment row finalized against.
    pub payment_id: PaymentId,
    /// Amount to charge the card.
    pub payment_amount: Decimal,
    /// Tickets created by this sale.
    pub ticket_ids: Vec<TicketId>,
    /// Compensating actions, replayed in reverse.
    pub undo: UndoPlan,
}

/// Arguments for `charge_sale`.
#[derive(Debug, Clone)]
pub struct ChargeSaleArgs {
    /// The prepared transaction to charge for.
    pub transaction_id: TransactionId,
    /// Its payment row.
    pub payment_id: PaymentId,
    /// The counterparty company (merchant destination).
    pub company_id: CompanyId,
    /// Issued-at of the caller's session token; part of the idempotency
    /// key, so retries of the same session reuse the same charge.
    pub session_iat: i64,
    /// The card to charge.
    pub source: CardSource,
}

/// Input for `purchase_route_pass`. Exactly one of `quantity` and
/// `value` must be set.
#[derive(Debug, Clone)]
pub struct RoutePassPurchaseInput {
    /// The purchaser.
    pub user_id: UserId,
    /// The company whose routes the pass redeems against.
    pub company_id: CompanyId,
    /// The route tag the pass is scoped to.
    pub tag: String,
    /// Number of passes to buy.
    pub quantity: Option<u32>,
    /// Total value to spend; converted to a quantity at the going price.
    pub value: Option<Decimal>,
    /// Optional promo code (route-pass scope).
    pub promo_code: Option<String>,
    /// Build without persisting or charging.
    pub dry_run: bool,
    /// Price the caller was quoted.
    pub expected_price: Option<Decimal>,
    /// Identity the transaction is recorded against.
    pub creator: Creator,
    /// Optional expiry stamped on the created passes.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoutePassPurchaseInput {
    /// Validates the option bag.
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless exactly one of quantity/value is set
    /// and positive.
    pub fn validate(&self) -> AppResult<()> {
        match (self.quantity, self.value) {
            (Some(_), Some(_)) | (None, None) => Err(AppError::Validation(
                "exactly one of quantity and value must be supplied".to_string(),
            )),
            (Some(0), None) => Err(AppError::Validation(
                "quantity must be positive".to_string(),
            )),
            (None, Some(v)) if v <= Decimal::ZERO => Err(AppError::Validation(
                "value must be positive".to_string(),
            )),
            _ => {
                if self.tag.trim().is_empty() {
                    return Err(AppError::Validation("tag must not be empty".to_string()));
                }
                Ok(())
            }
        }
    }
}

/// Result of a route-pass purchase.
#[derive(Debug)]
pub struct PreparedRoutePassPurchase {
    /// Id the transaction was (or would be) persisted under.
    pub transaction_id: TransactionId,
    /// The balanced journal entry.
    pub draft: TransactionDraft,
    /// The persisted rows; `None` on a dry run.
    pub persisted: Option<TransactionWithItems>,
    /// The payment row finalized against.
    pub payment_id: PaymentId,
    /// Amount to charge the card.
    pub payment_amount: Decimal,
    /// The passes created.
    pub pass_ids: Vec<RoutePassId>,
    /// Compensating actions, replayed in reverse.
    pub undo: UndoPlan,
}

/// Input for a ticket refund.
#[derive(Debug, Clone)]
pub struct TicketRefundInput {
    /// The ticket to refund.
    pub ticket_id: TicketId,
    /// Requested amount; must equal the post-discount ticket value.
    pub target_amount: Decimal,
    /// Caller credentials, checked against the ticket's company.
    pub credentials: Credentials,
}

/// Input for a route-pass refund.
#[derive(Debug, Clone)]
pub struct RoutePassRefundInput {
    /// The pass to refund.
    pub pass_id: RoutePassId,
    /// Requested amount; must equal the post-discount pass value.
    pub target_amount: Decimal,
    /// Caller credentials, checked against the pass's company.
    pub credentials: Credentials,
}

/// Result of a refund workflow.
#[derive(Debug)]
pub struct RefundOutcome {
    /// The persisted refund transaction.
    pub transaction: TransactionWithItems,
    /// The gateway refund sizing that was executed.
    pub refund_info: RefundInfo,
    /// Compensating actions, replayed in reverse.
    pub undo: UndoPlan,
}
