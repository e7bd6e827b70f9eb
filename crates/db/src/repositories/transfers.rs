//! Transfer row persistence.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use uuid::Uuid;

use farebox_shared::types::TransferId;

use crate::entities::transfers;

use super::RepoError;

/// Creates a transfer row. `incoming` is positive for settlements owed
/// to the company and negative for refund reversals.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    id: TransferId,
    company_id: Uuid,
    incoming: Decimal,
) -> Result<transfers::Model, RepoError> {
    let transfer = transfers::ActiveModel {
        id: Set(id.into_inner()),
        company_id: Set(company_id),
        incoming: Set(incoming),
        created_at: Set(Utc::now().into()),
    };
    Ok(transfer.insert(conn).await?)
}
