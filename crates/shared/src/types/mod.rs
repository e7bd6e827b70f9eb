//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{approx_eq, cents_to_dollars, dollars_to_cents, round_to_cent, AMOUNT_EPSILON};
