//! Booking-window computation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which stop time anchors the booking cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowType {
    /// Cutoff anchored at the passenger's own stops.
    Stop,
    /// Cutoff anchored at the trip's first stop.
    FirstStop,
}

/// A trip's booking window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    /// Which stop time anchors the cutoff.
    #[serde(rename = "windowType")]
    pub window_type: WindowType,
    /// Offset from the anchor, in milliseconds. Negative values close
    /// the window before departure.
    #[serde(rename = "windowSize")]
    pub window_size_ms: i64,
}

impl Default for BookingWindow {
    fn default() -> Self {
        Self {
            window_type: WindowType::Stop,
            window_size_ms: 0,
        }
    }
}

impl BookingWindow {
    /// Parses a trip's `bookingInfo` blob, falling back to the default
    /// window when it is missing or malformed.
    #[must_use]
    pub fn parse(booking_info: Option<&serde_json::Value>) -> Self {
        booking_info
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Computes the booking cutoff from the anchor times.
    ///
    /// `first_stop` is the earliest stop time of the whole trip;
    /// `board` and `alight` are the passenger's stops. Returns `None`
    /// when the anchor needed by the window type is unavailable.
    #[must_use]
    pub fn cutoff(
        &self,
        first_stop: Option<DateTime<Utc>>,
        board: Option<DateTime<Utc>>,
        alight: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let anchor = match self.window_type {
            WindowType::FirstStop => first_stop,
            WindowType::Stop => match (board, alight) {
                (Some(b), Some(a)) => Some(b.min(a)),
                (Some(b), None) => Some(b),
                (None, Some(a)) => Some(a),
                (None, None) => None,
            },
        };
        anchor.map(|t| t + Duration::milliseconds(self.window_size_ms))
    }
}
