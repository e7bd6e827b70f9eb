//! Booking-validity and duplicate-prevention checks.
//!
//! Every ticket sale is gated on these checks before the transaction
//! finalizes. They are pure functions over trip data the workflow has
//! already loaded; the workflow supplies the clock and the isolation
//! level.

pub mod checks;
pub mod window;

pub use checks::{
    check_booking_window, check_duplicates, check_running, check_seat_availability,
    check_single_company, check_valid_stops, BookingError, BookingFlags, ExistingTicket,
    TripContext, TripOrder,
};
pub use window::{BookingWindow, WindowType};
