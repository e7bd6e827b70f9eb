//! Route-pass persistence and status transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use uuid::Uuid;

use farebox_core::ledger::RoutePassStatus;
use farebox_core::routepass::RedeemablePass;
use farebox_shared::types::RoutePassId;

use crate::entities::{route_passes, sea_orm_active_enums};

use super::RepoError;

/// Creates a valid route pass priced at purchase time.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn insert_valid<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    company_id: Uuid,
    tag: &str,
    price: Decimal,
    expires_at: Option<DateTime<Utc>>,
) -> Result<route_passes::Model, RepoError> {
    let now = Utc::now().into();
    let pass = route_passes::ActiveModel {
        id: Set(RoutePassId::new().into_inner()),
        user_id: Set(user_id),
        company_id: Set(company_id),
        tag: Set(tag.to_string()),
        status: Set(sea_orm_active_enums::RoutePassStatus::Valid),
        notes: Set(json!({ "price": price })),
        expires_at: Set(expires_at.map(Into::into)),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(pass.insert(conn).await?)
}

/// Loads a route pass.
///
/// # Errors
///
/// Returns `NotFound` when the pass does not exist.
pub async fn get<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<route_passes::Model, RepoError> {
    route_passes::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| RepoError::not_found("RoutePass", id))
}

/// The price recorded on a pass at purchase.
///
/// # Errors
///
/// Returns `Corrupt` when the notes blob carries no usable price.
pub fn recorded_price(pass: &route_passes::Model) -> Result<Decimal, RepoError> {
    pass.notes
        .get("price")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| RepoError::Corrupt {
            entity: "RoutePass",
            id: pass.id,
            reason: "notes.price missing or not a decimal".to_string(),
        })
}

/// The user's redeemable passes for a tag and company: status `valid`
/// and not past expiry, soonest expiry first.
///
/// # Errors
///
/// Returns `Corrupt` when a pass carries no usable price.
pub async fn find_redeemable<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    company_id: Uuid,
    tag: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RedeemablePass>, RepoError> {
    let rows = route_passes::Entity::find()
        .filter(route_passes::Column::UserId.eq(user_id))
        .filter(route_passes::Column::CompanyId.eq(company_id))
        .filter(route_passes::Column::Tag.eq(tag))
        .filter(route_passes::Column::Status.eq(sea_orm_active_enums::RoutePassStatus::Valid))
        .order_by_asc(route_passes::Column::ExpiresAt)
        .all(conn)
        .await?;

    let mut passes = Vec::with_capacity(rows.len());
    for row in rows {
        let expires_at = row.expires_at.map(|t| t.with_timezone(&Utc));
        if expires_at.is_some_and(|t| t <= now) {
            continue;
        }
        passes.push(RedeemablePass {
            id: RoutePassId::from_uuid(row.id),
            price: recorded_price(&row)?,
            expires_at,
        });
    }
    Ok(passes)
}

/// Sets a pass's status. Idempotent.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn set_status<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    status: RoutePassStatus,
) -> Result<(), RepoError> {
    route_passes::Entity::update_many()
        .col_expr(
            route_passes::Column::Status,
            Expr::value(sea_orm_active_enums::RoutePassStatus::from(status)),
        )
        .col_expr(route_passes::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(route_passes::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Merges keys into a pass's notes blob.
///
/// # Errors
///
/// Returns `NotFound` when the pass does not exist.
pub async fn merge_notes<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    patch: serde_json::Value,
) -> Result<(), RepoError> {
    let pass = get(conn, id).await?;
    let mut notes = pass.notes.clone();
    if let (Some(target), Some(source)) = (notes.as_object_mut(), patch.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }

    let mut active: route_passes::ActiveModel = pass.into();
    active.notes = Set(notes);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}
