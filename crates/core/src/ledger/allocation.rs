//! Discount allocation across outstanding sale amounts.
//!
//! Discounts are distributed over the affected items in proportion to
//! their current outstanding amount. Every allocation is rounded to the
//! nearest cent and the last item absorbs the rounding residue, so the
//! sum of allocations equals the discount total exactly.

use farebox_shared::types::round_to_cent;
use rust_decimal::Decimal;

/// Allocates `total` proportionally over `outstanding`, in cents.
///
/// The total is capped at the sum of the outstanding amounts. Items with
/// zero outstanding receive zero. The last item with a nonzero weight
/// absorbs the rounding residue; if that would push it past its own
/// outstanding amount, the overflow is walked back onto earlier items
/// with headroom.
#[must_use]
pub fn allocate_proportional(total: Decimal, outstanding: &[Decimal]) -> Vec<Decimal> {
    let weight_sum: Decimal = outstanding.iter().copied().sum();
    if outstanding.is_empty() || weight_sum <= Decimal::ZERO || total <= Decimal::ZERO {
        return vec![Decimal::ZERO; outstanding.len()];
    }

    let total = round_to_cent(total.min(weight_sum));
    let last_nonzero = outstanding
        .iter()
        .rposition(|w| *w > Decimal::ZERO)
        .expect("weight_sum > 0 implies a nonzero weight");

    let mut allocations = vec![Decimal::ZERO; outstanding.len()];
    let mut allocated = Decimal::ZERO;

    for (i, weight) in outstanding.iter().enumerate() {
        if i == last_nonzero || *weight <= Decimal::ZERO {
            continue;
        }
        let share = round_to_cent(total * *weight / weight_sum).min(*weight);
        allocations[i] = share;
        allocated += share;
    }

    // Last item absorbs the residue, clamped to its outstanding amount.
    let mut residue = total - allocated;
    let absorbed = residue.min(outstanding[last_nonzero]);
    allocations[last_nonzero] = absorbed;
    residue -= absorbed;

    // Rounding pushed the residue past the last item's headroom; walk it
    // back onto earlier items.
    if residue > Decimal::ZERO {
        for i in (0..last_nonzero).rev() {
            if residue <= Decimal::ZERO {
                break;
            }
            let headroom = outstanding[i] - allocations[i];
            let extra = residue.min(headroom);
            allocations[i] += extra;
            residue -= extra;
        }
    }

    allocations
}

/// Allocates each item its full outstanding amount.
///
/// Used by the small-residual absorber, where the discount equals the
/// whole remaining payable.
#[must_use]
pub fn allocate_full_outstanding(outstanding: &[Decimal]) -> Vec<Decimal> {
    outstanding.iter().map(|w| (*w).max(Decimal::ZERO)).collect()
}
