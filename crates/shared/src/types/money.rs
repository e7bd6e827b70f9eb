//! Money helpers with decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All monetary amounts are `rust_decimal::Decimal` dollars; the payment
//! gateway speaks integer cents.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Tolerance used when comparing ledger amounts for equality.
pub const AMOUNT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Rounds an amount to the nearest cent using banker's rounding.
#[must_use]
pub fn round_to_cent(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Converts a dollar amount to integer cents, rounding to the nearest cent.
#[must_use]
pub fn dollars_to_cents(amount: Decimal) -> i64 {
    (round_to_cent(amount) * Decimal::from(100))
        .to_i64()
        .unwrap_or(0)
}

/// Converts integer cents to a dollar amount.
#[must_use]
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Returns true if two amounts are equal within the given tolerance.
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_to_cent_bankers() {
        // Midpoints round to the even cent
        assert_eq!(round_to_cent(dec!(1.005)), dec!(1.00));
        assert_eq!(round_to_cent(dec!(1.015)), dec!(1.02));
        assert_eq!(round_to_cent(dec!(1.014)), dec!(1.01));
    }

    #[test]
    fn test_dollars_to_cents() {
        assert_eq!(dollars_to_cents(dec!(15.00)), 1500);
        assert_eq!(dollars_to_cents(dec!(0.30)), 30);
        assert_eq!(dollars_to_cents(dec!(0)), 0);
    }

    #[test]
    fn test_cents_to_dollars() {
        assert_eq!(cents_to_dollars(1500), dec!(15.00));
        assert_eq!(cents_to_dollars(5), dec!(0.05));
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(dec!(10.000000), dec!(10.0000005), AMOUNT_EPSILON));
        assert!(!approx_eq(dec!(10.00), dec!(10.01), AMOUNT_EPSILON));
    }

    #[test]
    fn test_epsilon_value() {
        assert_eq!(AMOUNT_EPSILON, dec!(0.000001));
    }
}
