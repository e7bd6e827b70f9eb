//! Transaction and line-item persistence.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use farebox_core::ledger::{ItemType, Side, TransactionDraft};
use farebox_shared::types::{TransactionId, TransactionItemId};

use crate::entities::{sea_orm_active_enums, transaction_items, transactions};

use super::RepoError;

/// A persisted transaction with its line items.
#[derive(Debug, Clone)]
pub struct TransactionWithItems {
    /// Transaction header.
    pub transaction: transactions::Model,
    /// Line items.
    pub items: Vec<transaction_items::Model>,
}

/// Persists a built draft as a transaction row plus one row per item.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn persist_draft<C: ConnectionTrait>(
    conn: &C,
    id: TransactionId,
    draft: &TransactionDraft,
) -> Result<TransactionWithItems, RepoError> {
    let now = Utc::now().into();

    let header = transactions::ActiveModel {
        id: Set(id.into_inner()),
        transaction_type: Set(draft.transaction_type.into()),
        committed: Set(draft.committed),
        description: Set(draft.description.clone()),
        creator_scope: Set(draft.creator.scope.into()),
        creator_id: Set(draft.creator.id),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let transaction = header.insert(conn).await?;

    let mut items = Vec::with_capacity(draft.items.len());
    for line in &draft.items {
        let (debit, credit) = match line.side {
            Side::Debit => (Some(line.amount), None),
            Side::Credit => (None, Some(line.amount)),
        };
        let row = transaction_items::ActiveModel {
            id: Set(TransactionItemId::new().into_inner()),
            transaction_id: Set(transaction.id),
            item_type: Set(line.item_type.into()),
            item_id: Set(line.item_id),
            debit: Set(debit),
            credit: Set(credit),
            notes: Set(line.notes.clone()),
        };
        items.push(row.insert(conn).await?);
    }

    Ok(TransactionWithItems { transaction, items })
}

/// Loads a transaction with all its items.
///
/// # Errors
///
/// Returns `NotFound` when the transaction does not exist.
pub async fn load_with_items<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<TransactionWithItems, RepoError> {
    let transaction = transactions::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| RepoError::not_found("Transaction", id))?;

    let items = transaction_items::Entity::find()
        .filter(transaction_items::Column::TransactionId.eq(id))
        .all(conn)
        .await?;

    Ok(TransactionWithItems { transaction, items })
}

/// Flips a transaction's committed flag.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn set_committed<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    committed: bool,
) -> Result<(), RepoError> {
    transactions::Entity::update_many()
        .col_expr(transactions::Column::Committed, Expr::value(committed))
        .col_expr(transactions::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(transactions::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

/// The committed sale item for a ticket or route pass, with its
/// transaction.
///
/// # Errors
///
/// Returns `NotFound` when no committed sale references the entity.
pub async fn find_committed_sale<C: ConnectionTrait>(
    conn: &C,
    item_type: ItemType,
    entity_id: Uuid,
) -> Result<(transactions::Model, transaction_items::Model), RepoError> {
    let items = transaction_items::Entity::find()
        .filter(
            transaction_items::Column::ItemType
                .eq(sea_orm_active_enums::ItemType::from(item_type)),
        )
        .filter(transaction_items::Column::ItemId.eq(entity_id))
        .filter(transaction_items::Column::Credit.is_not_null())
        .all(conn)
        .await?;

    for item in items {
        let transaction = transactions::Entity::find_by_id(item.transaction_id)
            .one(conn)
            .await?;
        if let Some(transaction) = transaction {
            if transaction.committed {
                return Ok((transaction, item));
            }
        }
    }
    Err(RepoError::not_found("Committed sale for", entity_id))
}

/// Sum of refund debits already posted against a ticket or route pass.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn previously_refunded<C: ConnectionTrait>(
    conn: &C,
    item_type: ItemType,
    entity_id: Uuid,
) -> Result<Decimal, RepoError> {
    let items = transaction_items::Entity::find()
        .filter(
            transaction_items::Column::ItemType
                .eq(sea_orm_active_enums::ItemType::from(item_type)),
        )
        .filter(transaction_items::Column::ItemId.eq(entity_id))
        .filter(transaction_items::Column::Debit.is_not_null())
        .all(conn)
        .await?;

    Ok(items.iter().map(transaction_items::Model::debit_amount).sum())
}
