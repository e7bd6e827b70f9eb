//! Pre-finalization booking checks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use farebox_shared::types::{
    CompanyId, RouteId, StopId, TicketId, TripId, TripStopId, UserId,
};
use farebox_shared::AppError;

use crate::ledger::TicketStatus;

use super::window::BookingWindow;

/// One requested trip leg.
#[derive(Debug, Clone, Copy)]
pub struct TripOrder {
    /// The trip to book.
    pub trip_id: TripId,
    /// Boarding stop.
    pub board_stop_id: TripStopId,
    /// Alighting stop.
    pub alight_stop_id: TripStopId,
    /// The passenger.
    pub user_id: UserId,
}

/// A trip as loaded for booking, with its stops and route.
#[derive(Debug, Clone)]
pub struct TripContext {
    /// The trip.
    pub trip_id: TripId,
    /// The route the trip runs on.
    pub route_id: RouteId,
    /// The company operating the route.
    pub company_id: CompanyId,
    /// Ticket price for this trip.
    pub price: Decimal,
    /// Whether the trip is still running.
    pub is_running: bool,
    /// Seats remaining after current bookings.
    pub seats_available: i32,
    /// Parsed booking window.
    pub window: BookingWindow,
    /// Stop times keyed by trip-stop id.
    pub stops: Vec<(TripStopId, StopId, DateTime<Utc>)>,
    /// Route tags (route passes match on these).
    pub tags: Vec<String>,
}

impl TripContext {
    /// Time of the trip's earliest stop.
    #[must_use]
    pub fn first_stop_time(&self) -> Option<DateTime<Utc>> {
        self.stops.iter().map(|(_, _, t)| *t).min()
    }

    /// Time of the given trip stop, if it belongs to this trip.
    #[must_use]
    pub fn stop_time(&self, trip_stop_id: TripStopId) -> Option<DateTime<Utc>> {
        self.stops
            .iter()
            .find(|(id, _, _)| *id == trip_stop_id)
            .map(|(_, _, t)| *t)
    }
}

/// An existing ticket held by the user, used for duplicate detection.
#[derive(Debug, Clone, Copy)]
pub struct ExistingTicket {
    /// The ticket.
    pub ticket_id: TicketId,
    /// The trip it is for.
    pub trip_id: TripId,
    /// Its current status.
    pub status: TicketStatus,
}

/// Which checks a sale runs. Default: all on.
#[derive(Debug, Clone, Copy)]
pub struct BookingFlags {
    /// Re-read seat counts after pending tickets are inserted.
    pub ensure_availability: bool,
    /// Reject users who already hold a ticket for a requested trip.
    pub no_duplicates: bool,
    /// Enforce the booking window.
    pub booking_window: bool,
}

impl Default for BookingFlags {
    fn default() -> Self {
        Self {
            ensure_availability: true,
            no_duplicates: true,
            booking_window: true,
        }
    }
}

/// Booking check failures.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The sale requested no trips at all.
    #[error("No trips requested")]
    NoTrips,

    /// A requested trip was not found.
    #[error("Trip {0} not found")]
    TripNotFound(TripId),

    /// The trip has been cancelled.
    #[error("Trip {0} is not running")]
    TripNotRunning(TripId),

    /// A requested stop does not belong to the trip.
    #[error("Stop {stop} does not belong to trip {trip}")]
    InvalidStop {
        /// The trip.
        trip: TripId,
        /// The offending stop.
        stop: TripStopId,
    },

    /// The booking window has closed.
    #[error("Booking window for trip {trip} closed at {cutoff}")]
    WindowClosed {
        /// The trip.
        trip: TripId,
        /// When booking closed.
        cutoff: DateTime<Utc>,
    },

    /// The user already holds a ticket for this trip.
    #[error("User already has ticket {existing} for trip {trip}")]
    DuplicateTicket {
        /// The trip.
        trip: TripId,
        /// The ticket already held.
        existing: TicketId,
    },

    /// Overbooked: the seat count went negative.
    #[error("Trip {trip} is out of seats ({seats} available)")]
    SeatsExhausted {
        /// The trip.
        trip: TripId,
        /// The observed seat count.
        seats: i32,
    },

    /// Trips in one sale must belong to one company.
    #[error("Trips span more than one transport company")]
    MultipleCompanies,
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::TripNotFound(_) => Self::NotFound(err.to_string()),
            BookingError::NoTrips => Self::Validation(err.to_string()),
            _ => Self::TransactionRule(err.to_string()),
        }
    }
}

/// Fails if any requested trip has been cancelled.
///
/// # Errors
///
/// Returns `TripNotRunning` for the first cancelled trip.
pub fn check_running(trips: &[TripContext]) -> Result<(), BookingError> {
    for trip in trips {
        if !trip.is_running {
            return Err(BookingError::TripNotRunning(trip.trip_id));
        }
    }
    Ok(())
}

/// Fails unless both requested stops belong to the trip.
///
/// # Errors
///
/// Returns `InvalidStop` naming the offending stop.
pub fn check_valid_stops(trip: &TripContext, order: &TripOrder) -> Result<(), BookingError> {
    for stop in [order.board_stop_id, order.alight_stop_id] {
        if trip.stop_time(stop).is_none() {
            return Err(BookingError::InvalidStop {
                trip: trip.trip_id,
                stop,
            });
        }
    }
    Ok(())
}

/// Fails when `now` is past the trip's booking cutoff.
///
/// # Errors
///
/// Returns `WindowClosed` with the computed cutoff.
pub fn check_booking_window(
    trip: &TripContext,
    order: &TripOrder,
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    let cutoff = trip.window.cutoff(
        trip.first_stop_time(),
        trip.stop_time(order.board_stop_id),
        trip.stop_time(order.alight_stop_id),
    );
    if let Some(cutoff) = cutoff {
        if now > cutoff {
            return Err(BookingError::WindowClosed {
                trip: trip.trip_id,
                cutoff,
            });
        }
    }
    Ok(())
}

/// Fails when the user already holds a `valid` or `pending` ticket for
/// any requested trip.
///
/// # Errors
///
/// Returns `DuplicateTicket` naming the existing ticket.
pub fn check_duplicates(
    orders: &[TripOrder],
    existing: &[ExistingTicket],
) -> Result<(), BookingError> {
    for order in orders {
        let blocking = existing.iter().find(|t| {
            t.trip_id == order.trip_id
                && matches!(t.status, TicketStatus::Valid | TicketStatus::Pending)
        });
        if let Some(t) = blocking {
            return Err(BookingError::DuplicateTicket {
                trip: order.trip_id,
                existing: t.ticket_id,
            });
        }
    }
    Ok(())
}

/// Fails when any re-read seat count is negative.
///
/// Runs after pending tickets are inserted; the caller must hold an
/// isolation level that prevents lost updates on the seat counter.
///
/// # Errors
///
/// Returns `SeatsExhausted` for the first overbooked trip.
pub fn check_seat_availability(seats: &[(TripId, i32)]) -> Result<(), BookingError> {
    for (trip, count) in seats {
        if *count < 0 {
            return Err(BookingError::SeatsExhausted {
                trip: *trip,
                seats: *count,
            });
        }
    }
    Ok(())
}

/// Fails unless the trips share exactly one transport company; returns it.
///
/// # Errors
///
/// Returns `NoTrips` on an empty set and `MultipleCompanies` otherwise.
pub fn check_single_company(trips: &[TripContext]) -> Result<CompanyId, BookingError> {
    let mut companies: Vec<CompanyId> = trips.iter().map(|t| t.company_id).collect();
    companies.sort();
    companies.dedup();
    match companies.as_slice() {
        [] => Err(BookingError::NoTrips),
        [one] => Ok(*one),
        _ => Err(BookingError::MultipleCompanies),
    }
}
