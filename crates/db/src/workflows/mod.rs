//! Workflow orchestrators.
//!
//! Each workflow owns its database transaction and isolation level,
//! drives the core transaction builder, and talks to the payment
//! gateway through the injected seam. Isolation levels are per-workflow
//! constants, not caller options.

pub mod refund;
pub mod route_pass;
pub mod sale;
pub mod types;
pub mod undo;

pub use refund::RefundWorkflow;
pub use route_pass::RoutePassPurchaseWorkflow;
pub use sale::SaleWorkflow;
pub use types::{
    ChargeSaleArgs, PostTransactionHook, PreparedRoutePassPurchase, PreparedSale, RefundOutcome,
    RoutePassPurchaseInput, RoutePassRefundInput, TicketRefundInput, TicketSaleInput,
};
pub use undo::UndoPlan;

use sea_orm::{ConnectionTrait, DbErr};
use serde_json::json;

use farebox_core::ledger::{ItemType, SaleDiscount, StatusChange};
use farebox_shared::{AppError, AppResult};

use crate::repositories::{route_passes, tickets};

/// Maps raw connection-level errors onto the application surface.
pub(crate) fn db_err(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}

/// Runs the draft's deferred entity status writes.
pub(crate) async fn apply_status_changes<C: ConnectionTrait>(
    conn: &C,
    changes: &[StatusChange],
) -> AppResult<()> {
    for change in changes {
        match change {
            StatusChange::Ticket { ticket_id, status } => {
                tickets::set_status(conn, ticket_id.into_inner(), *status).await?;
            }
            StatusChange::RoutePass { pass_id, status } => {
                route_passes::set_status(conn, pass_id.into_inner(), *status).await?;
            }
        }
    }
    Ok(())
}

/// Writes each item's cumulative discount back onto the entity's notes
/// so refund math can subtract it later.
pub(crate) async fn apply_sale_discounts<C: ConnectionTrait>(
    conn: &C,
    discounts: &[SaleDiscount],
) -> AppResult<()> {
    for discount in discounts {
        let patch = json!({ "discountValue": discount.discount_value });
        match discount.item_type {
            ItemType::TicketSale => {
                tickets::merge_notes(conn, discount.item_id, patch).await?;
            }
            ItemType::RoutePass => {
                route_passes::merge_notes(conn, discount.item_id, patch).await?;
            }
            _ => {}
        }
    }
    Ok(())
}
