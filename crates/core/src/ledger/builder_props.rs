//! Property-based tests for the transaction builder.
//!
//! - Zero-sum: every built transaction balances within 1e-6
//! - Discount conservation: the discount debit equals the sum of
//!   per-item allocations
//! - Payment equals the cart total minus discounts

use proptest::prelude::*;
use rust_decimal::Decimal;

use farebox_shared::types::{AccountId, CompanyId, PaymentId, TicketId, TransferId, TripId};

use super::allocation::allocate_proportional;
use super::builder::{Settlement, TransactionBuilder};
use super::item::{ItemType, LineItem};
use super::types::{Creator, TransactionType};

/// Strategy for cart prices: 0.01 to 500.00 dollars, in cents.
fn price() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for carts of 1 to 6 trips.
fn cart() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(price(), 1..6)
}

/// Strategy for a discount rate between 0 and 100 percent.
fn rate() -> impl Strategy<Value = Decimal> {
    (0i64..=100i64).prop_map(Decimal::from)
}

fn build_cart(prices: &[Decimal]) -> TransactionBuilder {
    let mut b = TransactionBuilder::new(Creator::system(), None, true, false);
    let company = CompanyId::new();
    for p in prices {
        b.add_ticket_sale(TicketId::new(), TripId::new(), company, *p, vec![])
            .expect("distinct tickets, one company");
    }
    b
}

fn settlement() -> Settlement {
    Settlement {
        transfer_id: TransferId::new(),
        cogs_account_id: AccountId::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// For any cart, the finalized transaction balances exactly.
    #[test]
    fn prop_zero_sum(prices in cart()) {
        let mut b = build_cart(&prices);
        b.finalize_for_payment(PaymentId::new(), Some(settlement())).unwrap();
        let draft = b.build(TransactionType::TicketPurchase).unwrap();

        let signed: Decimal = draft.items.iter().map(LineItem::signed_amount).sum();
        prop_assert!(signed.abs() < Decimal::new(1, 6));
    }

    /// For any cart and percent discount, the discount line equals the
    /// sum of the per-item allocations, and the transaction balances.
    #[test]
    fn prop_discount_conservation(prices in cart(), pct in rate()) {
        let mut b = build_cart(&prices);
        let total: Decimal = prices.iter().copied().sum();
        let discount = total * pct / Decimal::from(100);

        let allocations =
            allocate_proportional(discount, &b.outstanding_of(ItemType::TicketSale));
        let applied = b.apply_discount("promo", &allocations).unwrap();

        let allocated: Decimal = allocations.iter().copied().sum();
        prop_assert_eq!(applied, allocated);

        b.finalize_for_payment(PaymentId::new(), Some(settlement())).unwrap();
        let draft = b.build(TransactionType::TicketPurchase).unwrap();
        prop_assert_eq!(draft.total_debit(), draft.total_credit());

        let discount_sum: Decimal = draft
            .items_of(ItemType::Discount)
            .iter()
            .map(|i| i.amount)
            .sum();
        let per_item: Decimal = draft
            .sale_discounts
            .iter()
            .map(|d| d.discount_value)
            .sum();
        prop_assert_eq!(discount_sum, per_item);
    }

    /// Payment always equals cart total minus the applied discount.
    #[test]
    fn prop_payment_is_net_of_discount(prices in cart(), pct in rate()) {
        let mut b = build_cart(&prices);
        let total: Decimal = prices.iter().copied().sum();
        let discount = total * pct / Decimal::from(100);

        let allocations =
            allocate_proportional(discount, &b.outstanding_of(ItemType::TicketSale));
        let applied = b.apply_discount("promo", &allocations).unwrap();

        let paid = b
            .finalize_for_payment(PaymentId::new(), Some(settlement()))
            .unwrap();
        prop_assert_eq!(paid, total - applied);
    }
}
