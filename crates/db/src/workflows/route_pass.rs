//! Route-pass purchase orchestration.

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait};
use tracing::info;

use farebox_core::ledger::{Settlement, TransactionBuilder, TransactionType, UndoOp};
use farebox_core::payment::{fees, is_micro};
use farebox_core::promotion::{apply_promotion, validate_promo_budget, PromoError, PromoScope};
use farebox_shared::types::{
    dollars_to_cents, round_to_cent, AccountId, PaymentId, PromotionId, RoutePassId,
    TransactionId, TransferId,
};
use farebox_shared::{AppError, AppResult};

use crate::repositories::{accounts, payments, promotions, route_passes, transactions, transfers, trips};

use super::types::{PostTransactionHook, PreparedRoutePassPurchase, RoutePassPurchaseInput};
use super::undo::UndoPlan;
use super::{apply_sale_discounts, apply_status_changes, db_err};

/// Orchestrates route-pass purchases. Runs at SERIALIZABLE.
///
/// Charging the finalized payment goes through
/// [`super::SaleWorkflow::charge_sale`], which reads the payment line
/// off the persisted transaction.
pub struct RoutePassPurchaseWorkflow {
    db: DatabaseConnection,
}

impl RoutePassPurchaseWorkflow {
    /// Creates a route-pass purchase workflow.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Purchases route passes for a user.
    ///
    /// Derives the per-pass price from the next upcoming trip of any
    /// route carrying the tag, converts between quantity and value,
    /// creates the passes with status `valid`, applies a route-pass
    /// scoped promo, finalizes payment and persists. The optional
    /// `post_hook` runs inside the database transaction after the
    /// journal entry persists, before commit.
    ///
    /// # Errors
    ///
    /// Returns a typed error and rolls the transaction back.
    pub async fn purchase_route_pass(
        &self,
        input: RoutePassPurchaseInput,
        post_hook: Option<PostTransactionHook>,
    ) -> AppResult<PreparedRoutePassPurchase> {
        input.validate()?;

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(db_err)?;

        match self.purchase_inner(&txn, &input, post_hook).await {
            Ok(prepared) => {
                if input.dry_run {
                    txn.rollback().await.map_err(db_err)?;
                } else {
                    txn.commit().await.map_err(db_err)?;
                }
                info!(
                    transaction_id = %prepared.transaction_id,
                    passes = prepared.pass_ids.len(),
                    amount = %prepared.payment_amount,
                    dry_run = input.dry_run,
                    "route passes purchased"
                );
                Ok(prepared)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn purchase_inner(
        &self,
        txn: &DatabaseTransaction,
        input: &RoutePassPurchaseInput,
        post_hook: Option<PostTransactionHook>,
    ) -> AppResult<PreparedRoutePassPurchase> {
        let price = trips::next_upcoming_price_for_tag(
            txn,
            input.company_id.into_inner(),
            &input.tag,
            Utc::now(),
        )
        .await?;
        if price <= Decimal::ZERO {
            return Err(AppError::TransactionRule(format!(
                "Tag {} has no positive price",
                input.tag
            )));
        }

        let quantity = match (input.quantity, input.value) {
            (Some(q), None) => q,
            (None, Some(value)) => {
                let q = (value / price)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
                    .to_u32()
                    .unwrap_or(0);
                if q == 0 {
                    return Err(AppError::TransactionRule(format!(
                        "Value {value} buys no passes at price {price}"
                    )));
                }
                q
            }
            _ => unreachable!("validate() enforces exactly one"),
        };
        let value = round_to_cent(price * Decimal::from(quantity));

        let mut builder = TransactionBuilder::new(
            input.creator,
            Some(format!(
                "{quantity} route pass(es) [{}] for {value}",
                input.tag
            )),
            true,
            input.dry_run,
        );

        let mut pass_ids = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let pass_id = if input.dry_run {
                RoutePassId::new()
            } else {
                let pass = route_passes::insert_valid(
                    txn,
                    input.user_id.into_inner(),
                    input.company_id.into_inner(),
                    &input.tag,
                    price,
                    input.expires_at,
                )
                .await?;
                RoutePassId::from_uuid(pass.id)
            };
            pass_ids.push(pass_id);

            builder
                .add_route_pass_sale(pass_id, input.company_id, price)
                .map_err(AppError::from)?;
            builder.record_undo(UndoOp::MarkRoutePassFailed { pass_id });
        }

        if let Some(code) = &input.promo_code {
            self.apply_promo_code(txn, code, &mut builder).await?;
        }

        builder
            .absorb_small_residual(fees::min_transaction_charge_cents())
            .map_err(AppError::from)?;

        let excess = builder.excess_credit();
        let micro = is_micro(dollars_to_cents(excess));
        let payment_id = PaymentId::new();
        let settlement = if excess > Decimal::ZERO {
            let transfer_id = TransferId::new();
            let cogs_account_id = if input.dry_run {
                AccountId::new()
            } else {
                transfers::insert(txn, transfer_id, input.company_id.into_inner(), excess)
                    .await?;
                let account = accounts::get_or_create(txn, accounts::COST_OF_GOODS_SOLD).await?;
                AccountId::from_uuid(account.id)
            };
            Some(Settlement {
                transfer_id,
                cogs_account_id,
            })
        } else {
            None
        };
        if !input.dry_run {
            payments::insert(txn, payment_id, micro).await?;
        }

        let payment_amount = builder
            .finalize_for_payment(payment_id, settlement)
            .map_err(AppError::from)?;
        builder
            .check_expected_price(input.expected_price)
            .map_err(AppError::from)?;

        let draft = builder
            .build(TransactionType::RoutePassPurchase)
            .map_err(AppError::from)?;

        let transaction_id = TransactionId::new();
        let persisted = if input.dry_run {
            None
        } else {
            let record = transactions::persist_draft(txn, transaction_id, &draft).await?;
            apply_sale_discounts(txn, &draft.sale_discounts).await?;
            apply_status_changes(txn, &draft.status_changes).await?;
            if let Some(hook) = post_hook {
                hook(txn).await?;
            }
            Some(record)
        };

        Ok(PreparedRoutePassPurchase {
            transaction_id,
            undo: UndoPlan::new(draft.undo_ops.clone()),
            payment_id,
            payment_amount,
            pass_ids,
            persisted,
            draft,
        })
    }

    /// Looks up and applies a route-pass scoped promo code.
    async fn apply_promo_code(
        &self,
        txn: &DatabaseTransaction,
        code: &str,
        builder: &mut TransactionBuilder,
    ) -> AppResult<()> {
        let model = promotions::find_by_code(txn, code)
            .await?
            .ok_or_else(|| AppError::from(PromoError::UnknownCode(code.to_string())))?;

        let spec = promotions::to_spec(&model)?;
        if spec.scope != PromoScope::RoutePass {
            return Err(PromoError::NotApplicable(code.to_string()).into());
        }
        if let (Some(promo_company), Some(cart_company)) = (model.company_id, builder.company_id())
        {
            if promo_company != cart_company.into_inner() {
                return Err(PromoError::NotApplicable(code.to_string()).into());
            }
        }
        validate_promo_budget(
            code,
            Utc::now(),
            model.starts_at.map(|t| t.with_timezone(&Utc)),
            model.ends_at.map(|t| t.with_timezone(&Utc)),
            model.usage_limit,
            model.usage_count,
        )
        .map_err(AppError::from)?;

        apply_promotion(builder, &spec).map_err(AppError::from)?;

        if !builder.is_dry_run() {
            promotions::increment_usage(txn, model.id).await?;
        }
        builder.record_undo(UndoOp::RestorePromotionUsage {
            promotion_id: PromotionId::from_uuid(model.id),
        });
        Ok(())
    }

    /// Suggested per-pass price and total for a quantity, without
    /// touching any state. Used by quote endpoints.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no upcoming trip carries the tag.
    pub async fn quote(
        &self,
        company_id: farebox_shared::types::CompanyId,
        tag: &str,
        quantity: u32,
    ) -> AppResult<(Decimal, Decimal)> {
        let price =
            trips::next_upcoming_price_for_tag(&self.db, company_id.into_inner(), tag, Utc::now())
                .await?;
        Ok((price, round_to_cent(price * Decimal::from(quantity))))
    }
}

impl std::fmt::Debug for RoutePassPurchaseWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePassPurchaseWorkflow")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farebox_core::ledger::Creator;
    use farebox_shared::types::{CompanyId, UserId};
    use rust_decimal_macros::dec;

    fn input() -> RoutePassPurchaseInput {
        RoutePassPurchaseInput {
            user_id: UserId::new(),
            company_id: CompanyId::new(),
            tag: "amber".to_string(),
            quantity: Some(5),
            value: None,
            promo_code: None,
            dry_run: false,
            expected_price: None,
            creator: Creator::system(),
            expires_at: None,
        }
    }

    #[test]
    fn test_exactly_one_of_quantity_value() {
        let mut i = input();
        assert!(i.validate().is_ok());

        i.value = Some(dec!(25.00));
        assert!(i.validate().is_err());

        i.quantity = None;
        assert!(i.validate().is_ok());

        i.value = None;
        assert!(i.validate().is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut i = input();
        i.quantity = Some(0);
        assert!(i.validate().is_err());
    }

    #[test]
    fn test_blank_tag_rejected() {
        let mut i = input();
        i.tag = "  ".to_string();
        assert!(i.validate().is_err());
    }
}
