//! Payment row persistence and charge-outcome recording.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde_json::json;
use uuid::Uuid;

use farebox_core::payment::{Charge, GatewayError};
use farebox_shared::types::PaymentId;

use crate::entities::payments;

use super::RepoError;

/// Creates a payment row for a finalized transaction.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    id: PaymentId,
    is_micro: bool,
) -> Result<payments::Model, RepoError> {
    let payment = payments::ActiveModel {
        id: Set(id.into_inner()),
        payment_resource: Set(None),
        data: Set(None),
        options: Set(json!({ "isMicro": is_micro })),
        created_at: Set(Utc::now().into()),
    };
    Ok(payment.insert(conn).await?)
}

/// Loads a payment row.
///
/// # Errors
///
/// Returns `NotFound` when the row does not exist.
pub async fn get<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<payments::Model, RepoError> {
    payments::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| RepoError::not_found("Payment", id))
}

/// Records a successful charge on the payment row.
///
/// # Errors
///
/// Returns `NotFound` when the row does not exist.
pub async fn record_charge<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    charge: &Charge,
    is_micro: bool,
) -> Result<(), RepoError> {
    let payment = get(conn, id).await?;
    let mut active: payments::ActiveModel = payment.into();
    active.payment_resource = Set(Some(charge.id.clone()));
    active.data = Set(Some(
        serde_json::to_value(charge).unwrap_or_else(|_| json!({})),
    ));
    active.options = Set(json!({ "isMicro": is_micro }));
    active.update(conn).await?;
    Ok(())
}

/// Records a gateway failure on the payment row for operator triage.
///
/// # Errors
///
/// Returns `NotFound` when the row does not exist.
pub async fn record_failure<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    error: &GatewayError,
) -> Result<(), RepoError> {
    let payment = get(conn, id).await?;
    let mut active: payments::ActiveModel = payment.into();
    active.data = Set(Some(json!({
        "error": error.to_string(),
        "detail": serde_json::to_value(error).unwrap_or_else(|_| json!({})),
    })));
    active.update(conn).await?;
    Ok(())
}
