//! Promo-code evaluation against a transaction builder.
//!
//! The rule engine that stores and looks up promotions is an external
//! collaborator; this module owns the math that turns a loaded promotion
//! into discount lines on the builder.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use farebox_shared::types::{round_to_cent, PromotionId};
use farebox_shared::AppError;

use crate::ledger::allocation::allocate_proportional;
use crate::ledger::{ItemType, TransactionBuilder};

/// How a promotion discounts the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum PromoKind {
    /// Percentage off the outstanding total.
    Percent {
        /// Rate in percent, 0-100.
        rate: Decimal,
    },
    /// Fixed amount off, capped at the outstanding total.
    Fixed {
        /// Discount amount in dollars.
        amount: Decimal,
    },
}

/// Which sale items a promotion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromoScope {
    /// Ticket sales.
    Ticket,
    /// Route-pass sales.
    RoutePass,
}

impl PromoScope {
    /// The line-item type this scope matches.
    #[must_use]
    pub fn item_type(self) -> ItemType {
        match self {
            Self::Ticket => ItemType::TicketSale,
            Self::RoutePass => ItemType::RoutePass,
        }
    }
}

/// A promotion as loaded from the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoSpec {
    /// The promotion row.
    pub id: PromotionId,
    /// The user-facing code.
    pub code: String,
    /// Discount shape.
    pub kind: PromoKind,
    /// Which sale items it applies to.
    pub scope: PromoScope,
}

/// Promotion failures.
#[derive(Debug, Error)]
pub enum PromoError {
    /// No promotion carries the code.
    #[error("Unknown promo code: {0}")]
    UnknownCode(String),

    /// The promotion's validity window has passed (or not begun).
    #[error("Promo code {0} has expired")]
    Expired(String),

    /// The promotion's usage limit is spent.
    #[error("Promo code {0} is exhausted")]
    Exhausted(String),

    /// The promotion does not apply to anything in this cart.
    #[error("Promo code {0} is not applicable to this purchase")]
    NotApplicable(String),
}

impl From<PromoError> for AppError {
    fn from(err: PromoError) -> Self {
        match err {
            PromoError::UnknownCode(_) => Self::NotFound(err.to_string()),
            _ => Self::TransactionRule(err.to_string()),
        }
    }
}

/// Validates a promotion's time window and usage budget.
///
/// # Errors
///
/// Returns `Expired` outside the window and `Exhausted` past the limit.
pub fn validate_promo_budget(
    code: &str,
    now: DateTime<Utc>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    usage_limit: Option<i32>,
    usage_count: i32,
) -> Result<(), PromoError> {
    if starts_at.is_some_and(|t| now < t) || ends_at.is_some_and(|t| now > t) {
        return Err(PromoError::Expired(code.to_string()));
    }
    if usage_limit.is_some_and(|limit| usage_count >= limit) {
        return Err(PromoError::Exhausted(code.to_string()));
    }
    Ok(())
}

/// Applies a promotion to the builder's outstanding items in scope.
///
/// Pushes a single discount line allocated proportionally over the
/// matching sale items and returns the discount total.
///
/// # Errors
///
/// Returns `NotApplicable` when nothing in the cart matches the scope or
/// the computed discount is zero.
pub fn apply_promotion(
    builder: &mut TransactionBuilder,
    promo: &PromoSpec,
) -> Result<Decimal, PromoError> {
    let outstanding = builder.outstanding_of(promo.scope.item_type());
    let outstanding_total: Decimal = outstanding.iter().copied().sum();
    if outstanding_total <= Decimal::ZERO {
        return Err(PromoError::NotApplicable(promo.code.clone()));
    }

    let target = match promo.kind {
        PromoKind::Percent { rate } => {
            round_to_cent(outstanding_total * rate / Decimal::from(100))
        }
        PromoKind::Fixed { amount } => round_to_cent(amount.min(outstanding_total)),
    };
    if target <= Decimal::ZERO {
        return Err(PromoError::NotApplicable(promo.code.clone()));
    }

    let allocations = allocate_proportional(target, &outstanding);
    let applied = builder
        .apply_discount_with_notes(
            json!({
                "description": format!("Promo code {}", promo.code),
                "promoCode": promo.code,
                "promotionId": promo.id,
            }),
            &allocations,
        )
        .map_err(|_| PromoError::NotApplicable(promo.code.clone()))?;

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Creator, TransactionType};
    use farebox_shared::types::{CompanyId, PaymentId, RoutePassId, TicketId, TripId};
    use rust_decimal_macros::dec;

    fn promo(kind: PromoKind, scope: PromoScope) -> PromoSpec {
        PromoSpec {
            id: PromotionId::new(),
            code: "SAVE20".to_string(),
            kind,
            scope,
        }
    }

    fn cart() -> TransactionBuilder {
        let mut b = TransactionBuilder::new(Creator::system(), None, true, false);
        let company = CompanyId::new();
        b.add_ticket_sale(TicketId::new(), TripId::new(), company, dec!(5.00), vec![])
            .unwrap();
        b.add_ticket_sale(TicketId::new(), TripId::new(), company, dec!(10.00), vec![])
            .unwrap();
        b
    }

    #[test]
    fn test_percent_promo() {
        let mut b = cart();
        let applied = apply_promotion(
            &mut b,
            &promo(PromoKind::Percent { rate: dec!(20) }, PromoScope::Ticket),
        )
        .unwrap();
        assert_eq!(applied, dec!(3.00));
        assert_eq!(b.excess_credit(), dec!(12.00));
    }

    #[test]
    fn test_fixed_promo_capped_at_outstanding() {
        let mut b = cart();
        let applied = apply_promotion(
            &mut b,
            &promo(PromoKind::Fixed { amount: dec!(99) }, PromoScope::Ticket),
        )
        .unwrap();
        assert_eq!(applied, dec!(15.00));
        assert_eq!(b.excess_credit(), Decimal::ZERO);
    }

    #[test]
    fn test_scope_mismatch_not_applicable() {
        let mut b = cart();
        let err = apply_promotion(
            &mut b,
            &promo(PromoKind::Percent { rate: dec!(20) }, PromoScope::RoutePass),
        )
        .unwrap_err();
        assert!(matches!(err, PromoError::NotApplicable(_)));
    }

    #[test]
    fn test_route_pass_scope_applies_to_pass_sales() {
        let mut b = TransactionBuilder::new(Creator::system(), None, true, false);
        b.add_route_pass_sale(RoutePassId::new(), CompanyId::new(), dec!(40.00))
            .unwrap();
        let applied = apply_promotion(
            &mut b,
            &promo(PromoKind::Percent { rate: dec!(10) }, PromoScope::RoutePass),
        )
        .unwrap();
        assert_eq!(applied, dec!(4.00));
    }

    #[test]
    fn test_budget_window() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(1);
        assert!(validate_promo_budget("X", now, None, Some(earlier), None, 0).is_err());
        assert!(validate_promo_budget("X", now, Some(earlier), None, None, 0).is_ok());
        assert!(matches!(
            validate_promo_budget("X", now, None, None, Some(5), 5),
            Err(PromoError::Exhausted(_))
        ));
    }

    #[test]
    fn test_promo_notes_carry_code() {
        let mut b = cart();
        apply_promotion(
            &mut b,
            &promo(PromoKind::Percent { rate: dec!(20) }, PromoScope::Ticket),
        )
        .unwrap();
        b.finalize_for_payment(
            PaymentId::new(),
            Some(crate::ledger::builder::Settlement {
                transfer_id: farebox_shared::types::TransferId::new(),
                cogs_account_id: farebox_shared::types::AccountId::new(),
            }),
        )
        .unwrap();
        let draft = b.build(TransactionType::TicketPurchase).unwrap();
        let discount = &draft.items_of(ItemType::Discount)[0];
        assert_eq!(discount.notes.as_ref().unwrap()["promoCode"], "SAVE20");
    }
}
