//! Promotion lookup and usage accounting.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use farebox_core::promotion::{PromoKind, PromoSpec};
use farebox_shared::types::PromotionId;

use crate::entities::promotions;

use super::RepoError;

/// Finds a promotion by its code.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn find_by_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<Option<promotions::Model>, RepoError> {
    Ok(promotions::Entity::find()
        .filter(promotions::Column::Code.eq(code))
        .one(conn)
        .await?)
}

/// Parses a promotion row into the core promo spec.
///
/// # Errors
///
/// Returns `Corrupt` when the params blob does not parse.
pub fn to_spec(model: &promotions::Model) -> Result<PromoSpec, RepoError> {
    let kind: PromoKind =
        serde_json::from_value(model.params.clone()).map_err(|e| RepoError::Corrupt {
            entity: "Promotion",
            id: model.id,
            reason: e.to_string(),
        })?;
    Ok(PromoSpec {
        id: PromotionId::from_uuid(model.id),
        code: model.code.clone(),
        kind,
        scope: model.scope.clone().into(),
    })
}

/// Consumes one use of a promotion.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn increment_usage<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), RepoError> {
    promotions::Entity::update_many()
        .col_expr(
            promotions::Column::UsageCount,
            Expr::col(promotions::Column::UsageCount).add(1),
        )
        .filter(promotions::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Returns one use of a promotion; never drops below zero.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn decrement_usage<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), RepoError> {
    promotions::Entity::update_many()
        .col_expr(
            promotions::Column::UsageCount,
            Expr::col(promotions::Column::UsageCount).sub(1),
        )
        .filter(promotions::Column::Id.eq(id))
        .filter(promotions::Column::UsageCount.gt(0))
        .exec(conn)
        .await?;
    Ok(())
}
