//! Gateway fee schedule.
//!
//! Fees are parameterized by two flags: whether the charge is a micro
//! transaction, and whether the card is locally issued and not American
//! Express. The concrete rates mirror the gateway's published schedule.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use super::gateway::CardSource;

/// The gateway refuses charges below this amount.
pub const MIN_CHARGE_CENTS: i64 = 50;

/// Charges strictly below this use the micro fee schedule.
pub const MICRO_THRESHOLD_CENTS: i64 = 1000;

/// Micro transactions: 5% + 5¢.
const MICRO_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);
const MICRO_FIXED_CENTS: i64 = 5;

/// Local non-Amex cards: 3.4% + 50¢.
const LOCAL_RATE: Decimal = Decimal::from_parts(34, 0, 0, false, 3);
const LOCAL_FIXED_CENTS: i64 = 50;

/// Everything else: 3.9% + 50¢.
const FOREIGN_RATE: Decimal = Decimal::from_parts(39, 0, 0, false, 3);
const FOREIGN_FIXED_CENTS: i64 = 50;

/// The minimum chargeable amount in cents.
#[must_use]
pub const fn min_transaction_charge_cents() -> i64 {
    MIN_CHARGE_CENTS
}

/// Whether an amount falls under the micro fee schedule.
#[must_use]
pub const fn is_micro(amount_cents: i64) -> bool {
    amount_cents < MICRO_THRESHOLD_CENTS
}

/// Whether the card is locally issued and not American Express.
#[must_use]
pub fn is_local_and_non_amex(source: &CardSource, home_country: &str) -> bool {
    let local = source
        .country
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(home_country));
    let amex = source
        .brand
        .as_deref()
        .is_some_and(|b| b.eq_ignore_ascii_case("American Express") || b.eq_ignore_ascii_case("amex"));
    local && !amex
}

/// The gateway admin fee for a charge, in cents.
///
/// Zero-amount charges carry no fee. The percentage component rounds to
/// the nearest cent.
#[must_use]
pub fn admin_fee_cents(amount_cents: i64, micro: bool, local_non_amex: bool) -> i64 {
    if amount_cents <= 0 {
        return 0;
    }
    let (rate, fixed) = if micro {
        (MICRO_RATE, MICRO_FIXED_CENTS)
    } else if local_non_amex {
        (LOCAL_RATE, LOCAL_FIXED_CENTS)
    } else {
        (FOREIGN_RATE, FOREIGN_FIXED_CENTS)
    };

    let variable = (Decimal::from(amount_cents) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .unwrap_or(0);
    variable + fixed
}
