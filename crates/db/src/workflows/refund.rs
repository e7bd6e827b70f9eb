//! Ticket and route-pass refund orchestration.
//!
//! Refunds run at the database's default isolation: they read a
//! committed origin transaction and write disjoint rows, guarded by the
//! all-or-nothing equality check. The gateway refund executes inside the
//! transaction scope; a gateway failure rolls everything back and the
//! idempotency key makes the retry safe.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use farebox_core::auth::AdminAuthz;
use farebox_core::ledger::{
    validate_refund_amounts, Creator, ItemType, RoutePassStatus, Settlement, StatusChange,
    TicketStatus, TransactionBuilder, TransactionType, UndoOp,
};
use farebox_core::payment::{
    generate_refund_info, refund_key, PaymentGateway, RefundInfo, RefundRequest, RefundTarget,
};
use farebox_shared::config::GatewayConfig;
use farebox_shared::types::{
    dollars_to_cents, AccountId, CompanyId, PaymentId, TransactionId, TransferId,
};
use farebox_shared::{AppError, AppResult};

use crate::entities::payments as payment_entities;
use crate::entities::sea_orm_active_enums;
use crate::repositories::{
    accounts, payments, route_passes, tickets, transactions, transfers, trips,
};

use super::types::{RefundOutcome, RoutePassRefundInput, TicketRefundInput};
use super::undo::UndoPlan;
use super::{apply_status_changes, db_err};

/// Action name asserted against the auth collaborator.
const REFUND_ACTION: &str = "refund";

/// Orchestrates ticket and route-pass refunds.
pub struct RefundWorkflow {
    db: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
    authz: Arc<dyn AdminAuthz>,
    gateway_config: GatewayConfig,
}

/// What a refund reverses, resolved from the origin transaction.
struct RefundOrigin {
    sale_transaction_id: TransactionId,
    sale_credit: Decimal,
    discount_value: Decimal,
    previously_refunded: Decimal,
    charge_id: String,
    is_micro: bool,
    company_id: CompanyId,
}

impl RefundWorkflow {
    /// Creates a refund workflow.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn PaymentGateway>,
        authz: Arc<dyn AdminAuthz>,
        gateway_config: GatewayConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            authz,
            gateway_config,
        }
    }

    /// Refunds a ticket in full (all-or-nothing policy).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` on a failed role assertion, `TransactionRule`
    /// on policy violations, and `Charge` when the gateway refuses the
    /// refund.
    pub async fn refund_ticket_sale(&self, input: TicketRefundInput) -> AppResult<RefundOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;

        match self.refund_ticket_inner(&txn, &input).await {
            Ok(outcome) => {
                txn.commit().await.map_err(db_err)?;
                info!(
                    ticket_id = %input.ticket_id,
                    amount = %outcome.refund_info.amount,
                    "ticket refunded"
                );
                Ok(outcome)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                warn!(ticket_id = %input.ticket_id, error = %err, "ticket refund failed");
                Err(err)
            }
        }
    }

    async fn refund_ticket_inner(
        &self,
        txn: &DatabaseTransaction,
        input: &TicketRefundInput,
    ) -> AppResult<RefundOutcome> {
        let ticket = tickets::get(txn, input.ticket_id.into_inner()).await?;
        let prior_status = TicketStatus::from(ticket.status.clone());
        if !matches!(prior_status, TicketStatus::Valid | TicketStatus::Void) {
            return Err(AppError::TransactionRule(format!(
                "Ticket {} is {:?} and cannot be refunded",
                input.ticket_id, prior_status
            )));
        }

        let contexts = trips::load_trip_contexts(txn, &[ticket.trip_id]).await?;
        let company_id = contexts[0].company_id;
        self.authz
            .assert_admin_role(&input.credentials, REFUND_ACTION, company_id)
            .map_err(AppError::from)?;

        let origin = self
            .resolve_origin(
                txn,
                ItemType::TicketSale,
                ItemType::TicketRefund,
                input.ticket_id.into_inner(),
                discount_value_of(&ticket.notes),
                company_id,
            )
            .await?;

        validate_refund_amounts(
            origin.sale_credit,
            origin.discount_value,
            origin.previously_refunded,
            input.target_amount,
        )
        .map_err(AppError::from)?;

        let key = refund_key(
            &self.gateway_config.idempotency_tag,
            RefundTarget::Ticket(input.ticket_id),
        );
        let charge = self
            .gateway
            .retrieve_charge(&origin.charge_id)
            .await
            .map_err(AppError::from)?;
        let refund_info = generate_refund_info(
            charge,
            input.target_amount,
            origin.is_micro,
            &self.gateway_config.home_country,
            key,
        )
        .map_err(AppError::from)?;

        let mut builder = TransactionBuilder::new(
            Creator {
                scope: input.credentials.scope,
                id: input.credentials.admin_id.or(input.credentials.driver_id),
            },
            Some(format!("Refund for ticket {}", input.ticket_id)),
            true,
            false,
        );
        builder
            .add_ticket_refund(input.ticket_id, company_id, input.target_amount)
            .map_err(AppError::from)?;
        let refund_payment_id = self
            .append_settlement(txn, &mut builder, &refund_info, origin.company_id)
            .await?;

        builder.record_status_change(StatusChange::Ticket {
            ticket_id: input.ticket_id,
            status: TicketStatus::Refunded,
        });
        builder.record_undo(UndoOp::RestoreTicketStatus {
            ticket_id: input.ticket_id,
            prior: prior_status,
        });

        let draft = builder
            .build(TransactionType::RefundPayment)
            .map_err(AppError::from)?;
        let refund_tx_id = TransactionId::new();
        let record = transactions::persist_draft(txn, refund_tx_id, &draft).await?;
        tickets::merge_notes(
            txn,
            input.ticket_id.into_inner(),
            json!({ "refundedTransactionId": origin.sale_transaction_id }),
        )
        .await?;
        apply_status_changes(txn, &draft.status_changes).await?;

        self.execute_gateway_refund(txn, &refund_info, refund_payment_id)
            .await?;

        Ok(RefundOutcome {
            transaction: record,
            refund_info,
            undo: UndoPlan::new(draft.undo_ops),
        })
    }

    /// Refunds a route pass in full.
    ///
    /// # Errors
    ///
    /// See [`Self::refund_ticket_sale`].
    pub async fn refund_route_pass(&self, input: RoutePassRefundInput) -> AppResult<RefundOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;

        match self.refund_pass_inner(&txn, &input).await {
            Ok(outcome) => {
                txn.commit().await.map_err(db_err)?;
                info!(
                    pass_id = %input.pass_id,
                    amount = %outcome.refund_info.amount,
                    "route pass refunded"
                );
                Ok(outcome)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                warn!(pass_id = %input.pass_id, error = %err, "route pass refund failed");
                Err(err)
            }
        }
    }

    async fn refund_pass_inner(
        &self,
        txn: &DatabaseTransaction,
        input: &RoutePassRefundInput,
    ) -> AppResult<RefundOutcome> {
        let pass = route_passes::get(txn, input.pass_id.into_inner()).await?;
        let prior_status = RoutePassStatus::from(pass.status.clone());
        if !prior_status.is_refundable() {
            return Err(AppError::TransactionRule(format!(
                "Route pass {} is {:?} and cannot be refunded",
                input.pass_id, prior_status
            )));
        }

        let company_id = CompanyId::from_uuid(pass.company_id);
        self.authz
            .assert_admin_role(&input.credentials, REFUND_ACTION, company_id)
            .map_err(AppError::from)?;

        let origin = self
            .resolve_origin(
                txn,
                ItemType::RoutePass,
                ItemType::RoutePass,
                input.pass_id.into_inner(),
                discount_value_of(&pass.notes),
                company_id,
            )
            .await?;

        validate_refund_amounts(
            origin.sale_credit,
            origin.discount_value,
            origin.previously_refunded,
            input.target_amount,
        )
        .map_err(AppError::from)?;

        let key = refund_key(
            &self.gateway_config.idempotency_tag,
            RefundTarget::RoutePass(input.pass_id),
        );
        let charge = self
            .gateway
            .retrieve_charge(&origin.charge_id)
            .await
            .map_err(AppError::from)?;
        let refund_info = generate_refund_info(
            charge,
            input.target_amount,
            origin.is_micro,
            &self.gateway_config.home_country,
            key,
        )
        .map_err(AppError::from)?;

        let mut builder = TransactionBuilder::new(
            Creator {
                scope: input.credentials.scope,
                id: input.credentials.admin_id.or(input.credentials.driver_id),
            },
            Some(format!("Refund for route pass {}", input.pass_id)),
            true,
            false,
        );
        builder
            .add_route_pass_refund(input.pass_id, company_id, input.target_amount)
            .map_err(AppError::from)?;
        let refund_payment_id = self
            .append_settlement(txn, &mut builder, &refund_info, origin.company_id)
            .await?;

        builder.record_status_change(StatusChange::RoutePass {
            pass_id: input.pass_id,
            status: RoutePassStatus::Refunded,
        });
        builder.record_undo(UndoOp::RestoreRoutePassStatus {
            pass_id: input.pass_id,
            prior: prior_status,
        });

        let draft = builder
            .build(TransactionType::RefundPayment)
            .map_err(AppError::from)?;
        let refund_tx_id = TransactionId::new();
        let record = transactions::persist_draft(txn, refund_tx_id, &draft).await?;
        route_passes::merge_notes(
            txn,
            input.pass_id.into_inner(),
            json!({ "refundedTransactionId": origin.sale_transaction_id }),
        )
        .await?;
        apply_status_changes(txn, &draft.status_changes).await?;

        self.execute_gateway_refund(txn, &refund_info, refund_payment_id)
            .await?;

        Ok(RefundOutcome {
            transaction: record,
            refund_info,
            undo: UndoPlan::new(draft.undo_ops),
        })
    }

    /// Resolves the committed origin sale, what was already refunded,
    /// and the charge behind its payment.
    async fn resolve_origin(
        &self,
        txn: &DatabaseTransaction,
        sale_type: ItemType,
        refund_type: ItemType,
        entity_id: Uuid,
        discount_value: Decimal,
        company_id: CompanyId,
    ) -> AppResult<RefundOrigin> {
        let (sale_tx, sale_item) =
            transactions::find_committed_sale(txn, sale_type, entity_id).await?;
        let previously_refunded =
            transactions::previously_refunded(txn, refund_type, entity_id).await?;

        let origin_record = transactions::load_with_items(txn, sale_tx.id).await?;
        let payment_item = origin_record
            .items
            .iter()
            .find(|i| i.item_type == sea_orm_active_enums::ItemType::Payment)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Transaction {} has no payment item",
                    sale_tx.id
                ))
            })?;
        let payment_row_id = payment_item.item_id.ok_or_else(|| {
            AppError::Internal(format!(
                "Payment item of transaction {} references no payment row",
                sale_tx.id
            ))
        })?;

        let payment: payment_entities::Model = payments::get(txn, payment_row_id).await?;
        let charge_id = payment.payment_resource.clone().ok_or_else(|| {
            AppError::TransactionRule(format!(
                "Transaction {} was never charged and cannot be refunded through the gateway",
                sale_tx.id
            ))
        })?;

        Ok(RefundOrigin {
            sale_transaction_id: TransactionId::from_uuid(sale_tx.id),
            sale_credit: sale_item.credit_amount(),
            discount_value,
            previously_refunded,
            charge_id,
            // Read off the Payment row's options, not item position.
            is_micro: payment.is_micro(),
            company_id,
        })
    }

    /// Books the money-out leg: refund payment row, transfer reversal
    /// and fee adjustment.
    async fn append_settlement(
        &self,
        txn: &DatabaseTransaction,
        builder: &mut TransactionBuilder,
        refund_info: &RefundInfo,
        company_id: CompanyId,
    ) -> AppResult<PaymentId> {
        let refund_payment_id = PaymentId::new();
        payments::insert(txn, refund_payment_id, refund_info.is_micro).await?;

        let net = refund_info.amount - refund_info.processing_fee;
        let transfer_id = TransferId::new();
        transfers::insert(txn, transfer_id, company_id.into_inner(), -net).await?;
        let account = accounts::get_or_create(txn, accounts::COST_OF_GOODS_SOLD).await?;

        builder
            .add_refund_settlement(
                refund_payment_id,
                Settlement {
                    transfer_id,
                    cogs_account_id: AccountId::from_uuid(account.id),
                },
                refund_info.amount,
                refund_info.processing_fee,
            )
            .map_err(AppError::from)?;
        Ok(refund_payment_id)
    }

    /// Executes the gateway refund and records the outcome on the
    /// refund's payment row. A failure propagates and rolls the whole
    /// transaction back; the idempotency key makes a retry safe.
    async fn execute_gateway_refund(
        &self,
        txn: &DatabaseTransaction,
        refund_info: &RefundInfo,
        refund_payment_id: PaymentId,
    ) -> AppResult<()> {
        let gateway_refund = self
            .gateway
            .refund(RefundRequest {
                charge_id: refund_info.charge.id.clone(),
                amount_cents: dollars_to_cents(refund_info.amount),
                idempotency_key: refund_info.idempotency_key.clone(),
            })
            .await
            .map_err(AppError::from)?;

        let payment = payments::get(txn, refund_payment_id.into_inner()).await?;
        let mut active: payment_entities::ActiveModel = payment.into();
        active.payment_resource = sea_orm::Set(Some(gateway_refund.id.clone()));
        active.data = sea_orm::Set(Some(
            serde_json::to_value(&gateway_refund).unwrap_or_else(|_| json!({})),
        ));
        sea_orm::ActiveModelTrait::update(active, txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

impl std::fmt::Debug for RefundWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefundWorkflow").finish_non_exhaustive()
    }
}

/// Reads the cumulative `discountValue` off an entity's notes blob.
fn discount_value_of(notes: &serde_json::Value) -> Decimal {
    notes
        .get("discountValue")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
