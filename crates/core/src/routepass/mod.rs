//! Route-pass redemption planning.
//!
//! A route pass is a prepaid, tag-scoped credit redeemable for a single
//! ticket on any trip of a matching route. Redemption planning is pure:
//! the workflow loads the user's redeemable passes per tag and this
//! module decides which pass covers which ticket.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use farebox_shared::types::RoutePassId;

use crate::ledger::{ItemType, TransactionBuilder};

/// A pass available for redemption (status `valid`, matching user, tag
/// and company).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemablePass {
    /// The pass.
    pub id: RoutePassId,
    /// The price recorded on the pass at purchase.
    pub price: Decimal,
    /// Optional expiry; sooner-expiring passes are consumed first.
    pub expires_at: Option<DateTime<Utc>>,
}

/// One planned redemption: a pass paired to a sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRedemption {
    /// The pass to consume.
    pub pass_id: RoutePassId,
    /// Index of the sale line it covers (into the builder's sales).
    pub sale_index: usize,
}

/// Distinct route tags across the builder's ticket sales, in the
/// alphabetical order tags are applied in.
#[must_use]
pub fn redemption_tags(builder: &TransactionBuilder) -> Vec<String> {
    let mut tags: Vec<String> = builder
        .sales()
        .iter()
        .filter(|s| s.item_type == ItemType::TicketSale)
        .flat_map(|s| s.tags.iter().cloned())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Plans redemptions of `passes` against the builder's ticket sales
/// carrying `tag`.
///
/// Tickets are covered in insertion order, one pass per ticket, skipping
/// lines with nothing outstanding. Passes are consumed soonest-expiry
/// first; passes without an expiry go last.
#[must_use]
pub fn plan_redemptions(
    builder: &TransactionBuilder,
    tag: &str,
    passes: &[RedeemablePass],
) -> Vec<PassRedemption> {
    let mut ordered: Vec<&RedeemablePass> = passes.iter().collect();
    ordered.sort_by_key(|p| (p.expires_at.is_none(), p.expires_at, p.id));

    let eligible = builder.sales().iter().enumerate().filter(|(_, s)| {
        s.item_type == ItemType::TicketSale
            && s.outstanding > Decimal::ZERO
            && s.tags.iter().any(|t| t == tag)
    });

    eligible
        .zip(ordered)
        .map(|((sale_index, _), pass)| PassRedemption {
            pass_id: pass.id,
            sale_index,
        })
        .collect()
}
