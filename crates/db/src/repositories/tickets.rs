//! Ticket persistence and status transitions.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde_json::json;
use uuid::Uuid;

use farebox_core::booking::{ExistingTicket, TripOrder};
use farebox_core::ledger::TicketStatus;
use farebox_shared::types::{TicketId, TripId};

use crate::entities::{sea_orm_active_enums, tickets};

use super::RepoError;

/// Creates a pending ticket for one trip order.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn insert_pending<C: ConnectionTrait>(
    conn: &C,
    order: &TripOrder,
) -> Result<tickets::Model, RepoError> {
    let now = Utc::now().into();
    let ticket = tickets::ActiveModel {
        id: Set(TicketId::new().into_inner()),
        user_id: Set(order.user_id.into_inner()),
        trip_id: Set(order.trip_id.into_inner()),
        board_stop_id: Set(order.board_stop_id.into_inner()),
        alight_stop_id: Set(order.alight_stop_id.into_inner()),
        status: Set(sea_orm_active_enums::TicketStatus::Pending),
        notes: Set(json!({})),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(ticket.insert(conn).await?)
}

/// Loads a ticket.
///
/// # Errors
///
/// Returns `NotFound` when the ticket does not exist.
pub async fn get<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<tickets::Model, RepoError> {
    tickets::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| RepoError::not_found("Ticket", id))
}

/// The user's existing tickets for any of the given trips.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn find_for_user_trips<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    trip_ids: &[Uuid],
) -> Result<Vec<ExistingTicket>, RepoError> {
    let rows = tickets::Entity::find()
        .filter(tickets::Column::UserId.eq(user_id))
        .filter(tickets::Column::TripId.is_in(trip_ids.iter().copied()))
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|t| ExistingTicket {
            ticket_id: TicketId::from_uuid(t.id),
            trip_id: TripId::from_uuid(t.trip_id),
            status: TicketStatus::from(t.status),
        })
        .collect())
}

/// Sets a ticket's status. Idempotent.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn set_status<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    status: TicketStatus,
) -> Result<(), RepoError> {
    tickets::Entity::update_many()
        .col_expr(
            tickets::Column::Status,
            Expr::value(sea_orm_active_enums::TicketStatus::from(status)),
        )
        .col_expr(tickets::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(tickets::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Merges keys into a ticket's notes blob.
///
/// # Errors
///
/// Returns `NotFound` when the ticket does not exist.
pub async fn merge_notes<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    patch: serde_json::Value,
) -> Result<(), RepoError> {
    let ticket = get(conn, id).await?;
    let mut notes = ticket.notes.clone();
    if let (Some(target), Some(source)) = (notes.as_object_mut(), patch.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }

    let mut active: tickets::ActiveModel = ticket.into();
    active.notes = Set(notes);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}
