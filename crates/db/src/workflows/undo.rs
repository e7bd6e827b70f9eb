//! Compensating undo execution.

use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::info;

use farebox_core::ledger::{RoutePassStatus, TicketStatus, UndoOp};
use farebox_shared::AppResult;

use crate::repositories::{promotions, route_passes, tickets};

use super::db_err;

/// The recorded compensating actions of one workflow run.
///
/// Replays its operations in reverse order under a fresh database
/// transaction. Every individual operation is idempotent, so replaying
/// a plan twice is safe.
#[derive(Debug, Clone, Default)]
pub struct UndoPlan {
    ops: Vec<UndoOp>,
}

impl UndoPlan {
    /// Wraps recorded undo operations.
    #[must_use]
    pub fn new(ops: Vec<UndoOp>) -> Self {
        Self { ops }
    }

    /// The recorded operations, in recording order.
    #[must_use]
    pub fn ops(&self) -> &[UndoOp] {
        &self.ops
    }

    /// Whether there is anything to undo.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Replays the plan in reverse under a fresh database transaction.
    ///
    /// # Errors
    ///
    /// Returns a database error if any operation fails; the transaction
    /// rolls back and the plan can be re-run.
    pub async fn run(&self, db: &DatabaseConnection) -> AppResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let txn = db.begin().await.map_err(db_err)?;
        for op in self.ops.iter().rev() {
            match op {
                UndoOp::MarkTicketFailed { ticket_id } => {
                    tickets::set_status(&txn, ticket_id.into_inner(), TicketStatus::Failed)
                        .await?;
                }
                UndoOp::RestoreTicketStatus { ticket_id, prior } => {
                    tickets::set_status(&txn, ticket_id.into_inner(), *prior).await?;
                }
                UndoOp::MarkRoutePassFailed { pass_id } => {
                    route_passes::set_status(
                        &txn,
                        pass_id.into_inner(),
                        RoutePassStatus::Failed,
                    )
                    .await?;
                }
                UndoOp::RestoreRoutePassStatus { pass_id, prior } => {
                    route_passes::set_status(&txn, pass_id.into_inner(), *prior).await?;
                }
                UndoOp::RestorePromotionUsage { promotion_id } => {
                    promotions::decrement_usage(&txn, promotion_id.into_inner()).await?;
                }
            }
        }
        txn.commit().await.map_err(db_err)?;

        info!(ops = self.ops.len(), "replayed undo plan");
        Ok(())
    }
}
