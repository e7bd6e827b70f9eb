//! Trip loading and seat accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use farebox_core::booking::{BookingWindow, TripContext};
use farebox_shared::types::{CompanyId, RouteId, StopId, TripId, TripStopId};

use crate::entities::{routes, trip_stops, trips};

use super::RepoError;

/// Loads each requested trip with its stops, route and company.
///
/// # Errors
///
/// Returns `NotFound` for the first missing trip or route.
pub async fn load_trip_contexts<C: ConnectionTrait>(
    conn: &C,
    trip_ids: &[Uuid],
) -> Result<Vec<TripContext>, RepoError> {
    let mut contexts = Vec::with_capacity(trip_ids.len());

    for &trip_id in trip_ids {
        let trip = trips::Entity::find_by_id(trip_id)
            .one(conn)
            .await?
            .ok_or_else(|| RepoError::not_found("Trip", trip_id))?;

        let route = routes::Entity::find_by_id(trip.route_id)
            .one(conn)
            .await?
            .ok_or_else(|| RepoError::not_found("Route", trip.route_id))?;

        let stops = trip_stops::Entity::find()
            .filter(trip_stops::Column::TripId.eq(trip_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|s| {
                (
                    TripStopId::from_uuid(s.id),
                    StopId::from_uuid(s.stop_id),
                    s.time.with_timezone(&Utc),
                )
            })
            .collect();

        contexts.push(TripContext {
            trip_id: TripId::from_uuid(trip.id),
            route_id: RouteId::from_uuid(route.id),
            company_id: CompanyId::from_uuid(route.company_id),
            price: trip.price,
            is_running: trip.is_running,
            seats_available: trip.seats_available,
            window: BookingWindow::parse(trip.booking_info.as_ref()),
            stops,
            tags: route.tag_list(),
        });
    }

    Ok(contexts)
}

/// Takes one seat from a trip.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn take_seat<C: ConnectionTrait>(conn: &C, trip_id: Uuid) -> Result<(), RepoError> {
    trips::Entity::update_many()
        .col_expr(
            trips::Column::SeatsAvailable,
            Expr::col(trips::Column::SeatsAvailable).sub(1),
        )
        .filter(trips::Column::Id.eq(trip_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Re-reads seat counts for the given trips.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn reread_seats<C: ConnectionTrait>(
    conn: &C,
    trip_ids: &[Uuid],
) -> Result<Vec<(TripId, i32)>, RepoError> {
    let rows = trips::Entity::find()
        .filter(trips::Column::Id.is_in(trip_ids.iter().copied()))
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|t| (TripId::from_uuid(t.id), t.seats_available))
        .collect())
}

/// Price of the next upcoming trip on any of the company's routes
/// carrying `tag`. Prices route passes.
///
/// # Errors
///
/// Returns `NotFound` when no upcoming trip carries the tag.
pub async fn next_upcoming_price_for_tag<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    tag: &str,
    now: DateTime<Utc>,
) -> Result<Decimal, RepoError> {
    let route_ids: Vec<Uuid> = routes::Entity::find()
        .filter(routes::Column::CompanyId.eq(company_id))
        .all(conn)
        .await?
        .into_iter()
        .filter(|r| r.tag_list().iter().any(|t| t == tag))
        .map(|r| r.id)
        .collect();

    if route_ids.is_empty() {
        return Err(RepoError::not_found("Route with tag", company_id));
    }

    let trip = trips::Entity::find()
        .filter(trips::Column::RouteId.is_in(route_ids))
        .filter(trips::Column::Date.gt(now))
        .filter(trips::Column::IsRunning.eq(true))
        .order_by_asc(trips::Column::Date)
        .limit(1)
        .one(conn)
        .await?
        .ok_or_else(|| RepoError::not_found("Upcoming trip for tag", company_id))?;

    Ok(trip.price)
}
