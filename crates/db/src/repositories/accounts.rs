//! Ledger account lookup.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use farebox_shared::types::AccountId;

use crate::entities::accounts;

use super::RepoError;

/// Name of the cost-of-goods-sold account sale finalization debits.
pub const COST_OF_GOODS_SOLD: &str = "Cost of Goods Sold";

/// Fetches an account by name, creating it on first use.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn get_or_create<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<accounts::Model, RepoError> {
    if let Some(existing) = accounts::Entity::find()
        .filter(accounts::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let account = accounts::ActiveModel {
        id: Set(AccountId::new().into_inner()),
        name: Set(name.to_string()),
    };
    Ok(account.insert(conn).await?)
}
