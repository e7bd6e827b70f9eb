//! Ticket sale orchestration: prepare, charge, cancel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait};
use tracing::{info, warn};
use uuid::Uuid;

use farebox_core::booking::{
    check_booking_window, check_duplicates, check_running, check_seat_availability,
    check_single_company, check_valid_stops,
};
use farebox_core::ledger::{
    RoutePassStatus, Settlement, StatusChange, TicketStatus, TransactionBuilder, UndoOp,
};
use farebox_core::payment::{
    booking_key, fees, is_micro, statement_descriptor, Charge, ChargeRequest, PaymentGateway,
};
use farebox_core::promotion::{apply_promotion, validate_promo_budget, PromoError};
use farebox_core::routepass::{plan_redemptions, redemption_tags};
use farebox_shared::config::GatewayConfig;
use farebox_shared::types::{
    dollars_to_cents, PaymentId, PromotionId, TicketId, TransactionId, TransferId,
};
use farebox_shared::{AppError, AppResult};

use crate::repositories::{
    accounts, companies, payments, promotions, route_passes, tickets, transactions, transfers,
    trips,
};

use super::types::{ChargeSaleArgs, PreparedSale, TicketSaleInput};
use super::undo::UndoPlan;
use super::{apply_sale_discounts, apply_status_changes, db_err};

/// Orchestrates ticket sales against the ledger and the gateway.
pub struct SaleWorkflow {
    db: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
    gateway_config: GatewayConfig,
}

impl SaleWorkflow {
    /// Creates a sale workflow.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn PaymentGateway>,
        gateway_config: GatewayConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            gateway_config,
        }
    }

    /// Prepares a ticket sale: checks, pending tickets, route-pass and
    /// promo discounts, residual absorption, finalization and (unless
    /// dry-run) persistence. Runs at REPEATABLE READ so the seat
    /// re-read cannot lose concurrent updates.
    ///
    /// # Errors
    ///
    /// Returns a typed error and rolls the database transaction back;
    /// recorded undo operations are returned to the caller only on
    /// success.
    pub async fn prepare_ticket_sale(&self, input: TicketSaleInput) -> AppResult<PreparedSale> {
        input.validate()?;

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), None)
            .await
            .map_err(db_err)?;

        match self.prepare_inner(&txn, &input).await {
            Ok(prepared) => {
                if input.dry_run {
                    txn.rollback().await.map_err(db_err)?;
                } else {
                    txn.commit().await.map_err(db_err)?;
                }
                info!(
                    transaction_id = %prepared.transaction_id,
                    amount = %prepared.payment_amount,
                    dry_run = input.dry_run,
                    "ticket sale prepared"
                );
                Ok(prepared)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn prepare_inner(
        &self,
        txn: &DatabaseTransaction,
        input: &TicketSaleInput,
    ) -> AppResult<PreparedSale> {
        let trip_ids: Vec<Uuid> = input.trips.iter().map(|t| t.trip_id.into_inner()).collect();
        let contexts = trips::load_trip_contexts(txn, &trip_ids).await?;
        let by_trip: HashMap<_, _> = contexts.iter().map(|c| (c.trip_id, c)).collect();

        // Unconditional gates.
        check_running(&contexts)?;
        for order in &input.trips {
            let ctx = by_trip
                .get(&order.trip_id)
                .ok_or_else(|| AppError::NotFound(format!("Trip {}", order.trip_id)))?;
            check_valid_stops(ctx, order)?;
            if input.checks.booking_window {
                check_booking_window(ctx, order, Utc::now())?;
            }
        }
        let company_id = check_single_company(&contexts)?;

        if input.checks.no_duplicates {
            let existing =
                tickets::find_for_user_trips(txn, input.purchaser().into_inner(), &trip_ids)
                    .await?;
            check_duplicates(&input.trips, &existing)?;
        }

        let mut builder = TransactionBuilder::new(
            input.creator,
            input.description.clone(),
            input.committed,
            input.dry_run,
        );

        // Pending tickets, one per leg; seats come off as each is created.
        let mut ticket_ids = Vec::with_capacity(input.trips.len());
        for order in &input.trips {
            let ctx = by_trip[&order.trip_id];
            let ticket_id = if input.dry_run {
                TicketId::new()
            } else {
                let ticket = tickets::insert_pending(txn, order).await?;
                trips::take_seat(txn, order.trip_id.into_inner()).await?;
                TicketId::from_uuid(ticket.id)
            };
            ticket_ids.push(ticket_id);

            builder
                .add_ticket_sale(
                    ticket_id,
                    order.trip_id,
                    ctx.company_id,
                    ctx.price,
                    ctx.tags.clone(),
                )
                .map_err(AppError::from)?;
            builder.record_undo(UndoOp::MarkTicketFailed { ticket_id });
            if input.committed {
                builder.record_status_change(StatusChange::Ticket {
                    ticket_id,
                    status: TicketStatus::Valid,
                });
            }
        }

        if input.checks.ensure_availability && !input.dry_run {
            let seats = trips::reread_seats(txn, &trip_ids).await?;
            check_seat_availability(&seats)?;
        }

        if input.apply_route_pass {
            self.redeem_route_passes(txn, input, &mut builder).await?;
        }

        if let Some(code) = &input.promo_code {
            self.apply_promo_code(txn, code, &mut builder).await?;
        }

        builder
            .absorb_small_residual(fees::min_transaction_charge_cents())
            .map_err(AppError::from)?;

        // Finalize against the cart's single company.
        let excess = builder.excess_credit();
        let micro = is_micro(dollars_to_cents(excess));
        let payment_id = PaymentId::new();
        let settlement = if excess > Decimal::ZERO {
            let transfer_id = TransferId::new();
            let cogs_account_id = if input.dry_run {
                farebox_shared::types::AccountId::new()
            } else {
                transfers::insert(txn, transfer_id, company_id.into_inner(), excess).await?;
                let account = accounts::get_or_create(txn, accounts::COST_OF_GOODS_SOLD).await?;
                farebox_shared::types::AccountId::from_uuid(account.id)
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
            .build(input.transaction_type)
            .map_err(AppError::from)?;

        let transaction_id = TransactionId::new();
        let persisted = if input.dry_run {
            None
        } else {
            let record = transactions::persist_draft(txn, transaction_id, &draft).await?;
            apply_sale_discounts(txn, &draft.sale_discounts).await?;
            apply_status_changes(txn, &draft.status_changes).await?;
            Some(record)
        };

        Ok(PreparedSale {
            transaction_id,
            undo: UndoPlan::new(draft.undo_ops.clone()),
            payment_id,
            payment_amount,
            ticket_ids,
            persisted,
            draft,
        })
    }

    /// Redeems the purchaser's route passes, one pass per ticket, tags
    /// in alphabetical order. Consumed passes flip `valid → void`.
    async fn redeem_route_passes(
        &self,
        txn: &DatabaseTransaction,
        input: &TicketSaleInput,
        builder: &mut TransactionBuilder,
    ) -> AppResult<()> {
        let company_id = builder
            .company_id()
            .ok_or_else(|| AppError::Internal("no company bound before redemption".to_string()))?;

        for tag in redemption_tags(builder) {
            let passes = route_passes::find_redeemable(
                txn,
                input.purchaser().into_inner(),
                company_id.into_inner(),
                &tag,
                Utc::now(),
            )
            .await?;
            if passes.is_empty() {
                continue;
            }

            for redemption in plan_redemptions(builder, &tag, &passes) {
                let pass = passes
                    .iter()
                    .find(|p| p.id == redemption.pass_id)
                    .expect("planned pass comes from the loaded set");
                let redeemed = builder
                    .apply_pass_redemption(redemption.sale_index, pass.id, pass.price)
                    .map_err(AppError::from)?;
                if redeemed.is_zero() {
                    continue;
                }

                if !input.dry_run {
                    route_passes::set_status(
                        txn,
                        pass.id.into_inner(),
                        RoutePassStatus::Void,
                    )
                    .await?;
                }
                builder.record_undo(UndoOp::RestoreRoutePassStatus {
                    pass_id: pass.id,
                    prior: RoutePassStatus::Valid,
                });
            }
        }
        Ok(())
    }

    /// Looks up, validates and applies a promo code, consuming one use.
    async fn apply_promo_code(
        &self,
        txn: &DatabaseTransaction,
        code: &str,
        builder: &mut TransactionBuilder,
    ) -> AppResult<()> {
        let model = promotions::find_by_code(txn, code)
            .await?
            .ok_or_else(|| AppError::from(PromoError::UnknownCode(code.to_string())))?;

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

        let spec = promotions::to_spec(&model)?;
        apply_promotion(builder, &spec).map_err(AppError::from)?;

        if !builder.is_dry_run() {
            promotions::increment_usage(txn, model.id).await?;
        }
        builder.record_undo(UndoOp::RestorePromotionUsage {
            promotion_id: PromotionId::from_uuid(model.id),
        });
        Ok(())
    }

    /// Charges the card for a prepared sale, exactly once per
    /// (transaction, session) thanks to the idempotency key. On success
    /// the Payment row records the charge; on failure it records the
    /// error in-band for operator triage and the caller may retry with
    /// the same key or run `cancel_sale`.
    ///
    /// Returns `None` when the finalized payment is zero (fully
    /// discounted cart) and no charge is attempted.
    ///
    /// # Errors
    ///
    /// Returns `Charge` on gateway decline or unavailability.
    pub async fn charge_sale(&self, args: ChargeSaleArgs) -> AppResult<Option<Charge>> {
        let record =
            transactions::load_with_items(&self.db, args.transaction_id.into_inner()).await?;
        let payment_amount: Decimal = record
            .items
            .iter()
            .filter(|i| {
                i.item_type == crate::entities::sea_orm_active_enums::ItemType::Payment
            })
            .map(|i| i.debit_amount())
            .sum();

        if payment_amount.is_zero() {
            return Ok(None);
        }

        let company = companies::get(&self.db, args.company_id.into_inner()).await?;
        let destination = companies::merchant_destination(&company, self.gateway_config.mode)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Company {} has no merchant account for the configured gateway mode",
                    company.id
                ))
            })?;

        let amount_cents = dollars_to_cents(payment_amount);
        let request = ChargeRequest {
            amount_cents,
            description: record
                .transaction
                .description
                .clone()
                .unwrap_or_else(|| format!("Ticket sale {}", args.transaction_id)),
            statement_descriptor: statement_descriptor(
                &company.name,
                company.sms_op_code.as_deref(),
                args.transaction_id,
            ),
            destination,
            idempotency_key: booking_key(
                &self.gateway_config.idempotency_tag,
                args.transaction_id,
                args.session_iat,
            ),
            source: args.source,
        };

        match self.gateway.charge(request).await {
            Ok(charge) => {
                payments::record_charge(
                    &self.db,
                    args.payment_id.into_inner(),
                    &charge,
                    is_micro(amount_cents),
                )
                .await?;
                info!(
                    transaction_id = %args.transaction_id,
                    charge_id = %charge.id,
                    "sale charged"
                );
                Ok(Some(charge))
            }
            Err(err) => {
                warn!(
                    transaction_id = %args.transaction_id,
                    error = %err,
                    "gateway charge failed"
                );
                payments::record_failure(&self.db, args.payment_id.into_inner(), &err).await?;
                Err(err.into())
            }
        }
    }

    /// Cancels a committed sale after a gateway decline: flips the
    /// transaction to uncommitted and fails every sold ticket. Runs at
    /// SERIALIZABLE.
    ///
    /// # Errors
    ///
    /// Returns `TransactionRule` when the transaction is not committed
    /// or any sold ticket is not currently valid.
    pub async fn cancel_sale(&self, transaction_id: TransactionId) -> AppResult<()> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(db_err)?;

        let result = Self::cancel_inner(&txn, transaction_id).await;
        match result {
            Ok(()) => {
                txn.commit().await.map_err(db_err)?;
                info!(transaction_id = %transaction_id, "sale cancelled");
                Ok(())
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn cancel_inner(
        txn: &DatabaseTransaction,
        transaction_id: TransactionId,
    ) -> AppResult<()> {
        let record = transactions::load_with_items(txn, transaction_id.into_inner()).await?;
        if !record.transaction.committed {
            return Err(AppError::TransactionRule(format!(
                "Transaction {transaction_id} is not committed"
            )));
        }

        transactions::set_committed(txn, transaction_id.into_inner(), false).await?;

        for item in &record.items {
            if item.item_type != crate::entities::sea_orm_active_enums::ItemType::TicketSale {
                continue;
            }
            let Some(ticket_id) = item.item_id else {
                continue;
            };
            let ticket = tickets::get(txn, ticket_id).await?;
            if ticket.status != crate::entities::sea_orm_active_enums::TicketStatus::Valid {
                return Err(AppError::TransactionRule(format!(
                    "Ticket {ticket_id} is not valid and cannot be failed"
                )));
            }
            tickets::set_status(txn, ticket_id, TicketStatus::Failed).await?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for SaleWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleWorkflow").finish_non_exhaustive()
    }
}
