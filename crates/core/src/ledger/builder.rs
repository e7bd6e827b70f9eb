//! The transaction builder.
//!
//! A `TransactionBuilder` accumulates typed line items for one journal
//! entry: sale credits, discount debits, and the closing payment /
//! transfer / cost-of-goods-sold lines. `build` validates the zero-sum
//! invariant and returns a pure [`TransactionDraft`]; persisting it (or
//! not, on a dry run) is the calling workflow's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use farebox_shared::types::{
    approx_eq, dollars_to_cents, round_to_cent, AccountId, CompanyId, PaymentId, RoutePassId,
    TicketId, TransferId, TripId, AMOUNT_EPSILON,
};

use super::allocation::allocate_full_outstanding;
use super::error::LedgerError;
use super::item::{ItemType, LineItem};
use super::types::{Creator, TransactionType};
use super::undo::{StatusChange, UndoOp};

/// Tolerance for the expected-price check.
const PRICE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Label of the discount emitted by the small-residual absorber.
pub const ABSORB_SMALL_PAYMENTS: &str = "[absorb-small-payments]";

/// One sale line and its running discount state.
#[derive(Debug, Clone)]
pub struct SaleLine {
    /// `TicketSale` or `RoutePass`.
    pub item_type: ItemType,
    /// The ticket or pass being sold.
    pub item_id: Uuid,
    /// The trip a ticket sale is for.
    pub trip_id: Option<TripId>,
    /// Route tags, used to match route passes against ticket sales.
    pub tags: Vec<String>,
    /// The full sale price (the credit amount).
    pub price: Decimal,
    /// Price minus discounts allocated so far.
    pub outstanding: Decimal,
    /// Cumulative discount allocated to this line.
    pub discount_value: Decimal,
}

/// The cumulative discount recorded against one sold item.
///
/// Workflows write these back to the entity's `notes.discountValue` so
/// refund math can subtract them later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDiscount {
    /// `TicketSale` or `RoutePass`.
    pub item_type: ItemType,
    /// The ticket or pass.
    pub item_id: Uuid,
    /// Total discount allocated.
    pub discount_value: Decimal,
}

/// Settlement targets for `finalize_for_payment`.
#[derive(Debug, Clone, Copy)]
pub struct Settlement {
    /// The transfer row the company settlement credit posts against.
    pub transfer_id: TransferId,
    /// The cost-of-goods-sold account the mirroring debit posts against.
    pub cogs_account_id: AccountId,
}

/// A validated, balanced journal entry ready to persist.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// Transaction classification.
    pub transaction_type: TransactionType,
    /// Human-readable description.
    pub description: Option<String>,
    /// Identity the transaction is recorded against.
    pub creator: Creator,
    /// Whether the transaction is committed on persist.
    pub committed: bool,
    /// Dry-run drafts are never persisted.
    pub dry_run: bool,
    /// The single counterparty company, when sale items exist.
    pub company_id: Option<CompanyId>,
    /// Line items in insertion order.
    pub items: Vec<LineItem>,
    /// Compensating actions, replayed in reverse on failure.
    pub undo_ops: Vec<UndoOp>,
    /// Entity status writes to run once the journal entry persists.
    pub status_changes: Vec<StatusChange>,
    /// Per-item cumulative discounts to write back onto entities.
    pub sale_discounts: Vec<SaleDiscount>,
}

impl TransactionDraft {
    /// Returns all items of the given type.
    #[must_use]
    pub fn items_of(&self, item_type: ItemType) -> Vec<&LineItem> {
        self.items
            .iter()
            .filter(|i| i.item_type == item_type)
            .collect()
    }

    /// Returns the payment line, if one was finalized.
    #[must_use]
    pub fn payment_item(&self) -> Option<&LineItem> {
        self.items.iter().find(|i| i.item_type == ItemType::Payment)
    }

    /// Returns the transfer line, if any.
    #[must_use]
    pub fn transfer_item(&self) -> Option<&LineItem> {
        self.items
            .iter()
            .find(|i| i.item_type == ItemType::Transfer)
    }

    /// Sum of all debit amounts.
    #[must_use]
    pub fn total_debit(&self) -> Decimal {
        self.items.iter().map(LineItem::debit_amount).sum()
    }

    /// Sum of all credit amounts.
    #[must_use]
    pub fn total_credit(&self) -> Decimal {
        self.items.iter().map(LineItem::credit_amount).sum()
    }
}

/// In-memory assembly of one balanced transaction.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    creator: Creator,
    description: Option<String>,
    committed: bool,
    dry_run: bool,
    company_id: Option<CompanyId>,
    sales: Vec<SaleLine>,
    extra_items: Vec<LineItem>,
    payment_amount: Option<Decimal>,
    undo_ops: Vec<UndoOp>,
    status_changes: Vec<StatusChange>,
}

impl TransactionBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(creator: Creator, description: Option<String>, committed: bool, dry_run: bool) -> Self {
        Self {
            creator,
            description,
            committed,
            dry_run,
            company_id: None,
            sales: Vec::new(),
            extra_items: Vec::new(),
            payment_amount: None,
            undo_ops: Vec::new(),
            status_changes: Vec::new(),
        }
    }

    /// Whether this builder persists nothing.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Whether the built transaction is committed on persist.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// The single counterparty company bound so far.
    #[must_use]
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    /// The sale lines added so far, in insertion order.
    #[must_use]
    pub fn sales(&self) -> &[SaleLine] {
        &self.sales
    }

    /// Outstanding amounts of sale lines matching `item_type`, aligned
    /// with [`Self::sales`] (non-matching lines report zero).
    #[must_use]
    pub fn outstanding_of(&self, item_type: ItemType) -> Vec<Decimal> {
        self.sales
            .iter()
            .map(|s| {
                if s.item_type == item_type {
                    s.outstanding
                } else {
                    Decimal::ZERO
                }
            })
            .collect()
    }

    fn bind_company(&mut self, company_id: CompanyId) -> Result<(), LedgerError> {
        match self.company_id {
            None => {
                self.company_id = Some(company_id);
                Ok(())
            }
            Some(existing) if existing == company_id => Ok(()),
            Some(existing) => Err(LedgerError::MultipleCompanies {
                existing,
                got: company_id,
            }),
        }
    }

    fn check_amount(amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount(amount));
        }
        Ok(())
    }

    /// Adds a ticket-sale credit at the trip price.
    ///
    /// # Errors
    ///
    /// Rejects duplicate tickets, company mismatches and negative prices.
    pub fn add_ticket_sale(
        &mut self,
        ticket_id: TicketId,
        trip_id: TripId,
        company_id: CompanyId,
        price: Decimal,
        tags: Vec<String>,
    ) -> Result<(), LedgerError> {
        Self::check_amount(price)?;
        if self
            .sales
            .iter()
            .any(|s| s.item_type == ItemType::TicketSale && s.item_id == ticket_id.into_inner())
        {
            return Err(LedgerError::DuplicateTicket(ticket_id));
        }
        self.bind_company(company_id)?;

        self.sales.push(SaleLine {
            item_type: ItemType::TicketSale,
            item_id: ticket_id.into_inner(),
            trip_id: Some(trip_id),
            tags,
            price,
            outstanding: price,
            discount_value: Decimal::ZERO,
        });
        Ok(())
    }

    /// Adds a route-pass sale credit at the pass price.
    ///
    /// # Errors
    ///
    /// Rejects company mismatches and negative prices.
    pub fn add_route_pass_sale(
        &mut self,
        pass_id: RoutePassId,
        company_id: CompanyId,
        price: Decimal,
    ) -> Result<(), LedgerError> {
        Self::check_amount(price)?;
        self.bind_company(company_id)?;

        self.sales.push(SaleLine {
            item_type: ItemType::RoutePass,
            item_id: pass_id.into_inner(),
            trip_id: None,
            tags: Vec::new(),
            price,
            outstanding: price,
            discount_value: Decimal::ZERO,
        });
        Ok(())
    }

    /// Applies a discount with per-line allocations aligned with
    /// [`Self::sales`]. Pushes a single `discount` debit equal to the
    /// allocation total and returns it.
    ///
    /// # Errors
    ///
    /// Rejects misaligned allocation vectors and allocations exceeding a
    /// line's outstanding amount.
    pub fn apply_discount(
        &mut self,
        description: &str,
        allocations: &[Decimal],
    ) -> Result<Decimal, LedgerError> {
        self.apply_discount_with_notes(json!({ "description": description }), allocations)
    }

    /// Like [`Self::apply_discount`] with caller-supplied notes.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_discount`].
    pub fn apply_discount_with_notes(
        &mut self,
        notes: serde_json::Value,
        allocations: &[Decimal],
    ) -> Result<Decimal, LedgerError> {
        if allocations.len() != self.sales.len() {
            return Err(LedgerError::AllocationMismatch {
                expected: self.sales.len(),
                got: allocations.len(),
            });
        }

        let mut total = Decimal::ZERO;
        for (line, allocation) in self.sales.iter().zip(allocations) {
            Self::check_amount(*allocation)?;
            if *allocation > line.outstanding + AMOUNT_EPSILON {
                return Err(LedgerError::DiscountExceedsOutstanding {
                    allocation: *allocation,
                    outstanding: line.outstanding,
                });
            }
            total += *allocation;
        }
        if total.is_zero() {
            return Ok(Decimal::ZERO);
        }

        for (line, allocation) in self.sales.iter_mut().zip(allocations) {
            line.outstanding = (line.outstanding - *allocation).max(Decimal::ZERO);
            line.discount_value += *allocation;
        }

        self.extra_items
            .push(LineItem::debit(ItemType::Discount, None, total).with_notes(notes));
        Ok(total)
    }

    /// Redeems one route pass against the sale line at `index`, emitting
    /// a dedicated discount line capped at the line's outstanding amount.
    /// Returns the redeemed amount.
    ///
    /// # Errors
    ///
    /// Rejects out-of-range indexes and negative pass prices.
    pub fn apply_pass_redemption(
        &mut self,
        index: usize,
        pass_id: RoutePassId,
        pass_price: Decimal,
    ) -> Result<Decimal, LedgerError> {
        Self::check_amount(pass_price)?;
        let sales_len = self.sales.len();
        let line = self
            .sales
            .get_mut(index)
            .ok_or(LedgerError::AllocationMismatch {
                expected: sales_len,
                got: index + 1,
            })?;

        let amount = pass_price.min(line.outstanding);
        if amount.is_zero() {
            return Ok(Decimal::ZERO);
        }
        line.outstanding -= amount;
        line.discount_value += amount;

        self.extra_items.push(
            LineItem::debit(ItemType::Discount, Some(pass_id.into_inner()), amount).with_notes(
                json!({
                    "description": "Route pass redemption",
                    "routePassId": pass_id,
                }),
            ),
        );
        Ok(amount)
    }

    /// Appends a refund debit reversing a ticket sale.
    ///
    /// # Errors
    ///
    /// Rejects company mismatches and negative amounts.
    pub fn add_ticket_refund(
        &mut self,
        ticket_id: TicketId,
        company_id: CompanyId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        self.bind_company(company_id)?;
        self.extra_items.push(LineItem::debit(
            ItemType::TicketRefund,
            Some(ticket_id.into_inner()),
            amount,
        ));
        Ok(())
    }

    /// Appends a refund debit reversing a route-pass sale.
    ///
    /// # Errors
    ///
    /// Rejects company mismatches and negative amounts.
    pub fn add_route_pass_refund(
        &mut self,
        pass_id: RoutePassId,
        company_id: CompanyId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        self.bind_company(company_id)?;
        self.extra_items.push(LineItem::debit(
            ItemType::RoutePass,
            Some(pass_id.into_inner()),
            amount,
        ));
        Ok(())
    }

    /// Appends the money-out leg of a refund: a payment credit for the
    /// full amount plus the company transfer reversal and
    /// cost-of-goods-sold adjustment, both net of the processing fee
    /// the gateway does not return. The two net legs offset each other,
    /// so the entry balances for any fee.
    ///
    /// # Errors
    ///
    /// Rejects negative amounts and fees exceeding the refund.
    pub fn add_refund_settlement(
        &mut self,
        payment_id: PaymentId,
        settlement: Settlement,
        amount: Decimal,
        processing_fee: Decimal,
    ) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        Self::check_amount(processing_fee)?;
        let net = amount - processing_fee;
        Self::check_amount(net)?;

        self.extra_items.push(LineItem::credit(
            ItemType::Payment,
            Some(payment_id.into_inner()),
            amount,
        ));
        if net > Decimal::ZERO {
            self.extra_items.push(
                LineItem::debit(
                    ItemType::Transfer,
                    Some(settlement.transfer_id.into_inner()),
                    net,
                )
                .with_notes(json!({
                    "companyId": self.company_id,
                    "processingFee": processing_fee,
                })),
            );
            self.extra_items.push(LineItem::credit(
                ItemType::Account,
                Some(settlement.cogs_account_id.into_inner()),
                net,
            ));
        }
        Ok(())
    }

    /// `Σ credit − Σ debit` across all items.
    #[must_use]
    pub fn excess_credit(&self) -> Decimal {
        let credits: Decimal = self
            .sales
            .iter()
            .map(|s| s.price)
            .chain(
                self.extra_items
                    .iter()
                    .map(LineItem::credit_amount),
            )
            .sum();
        let debits: Decimal = self.extra_items.iter().map(LineItem::debit_amount).sum();
        credits - debits
    }

    /// Converts a positive residual below the gateway minimum into an
    /// `[absorb-small-payments]` discount so no card charge is attempted.
    /// Returns the absorbed amount, if any.
    ///
    /// # Errors
    ///
    /// Propagates discount-application failures.
    pub fn absorb_small_residual(
        &mut self,
        min_charge_cents: i64,
    ) -> Result<Option<Decimal>, LedgerError> {
        let excess = self.excess_credit();
        if excess <= Decimal::ZERO || dollars_to_cents(excess) > min_charge_cents {
            return Ok(None);
        }

        let outstanding: Vec<Decimal> = self.sales.iter().map(|s| s.outstanding).collect();
        let allocations = allocate_full_outstanding(&outstanding);
        let absorbed = self.apply_discount(ABSORB_SMALL_PAYMENTS, &allocations)?;
        Ok(Some(absorbed))
    }

    /// Closes the journal entry against the counterparty company.
    ///
    /// Computes the excess credit; when positive, appends a `payment`
    /// debit, a `transfer` credit and a mirroring cost-of-goods-sold
    /// `account` debit, all equal to the excess. A zero-excess cart still
    /// gets a zero payment line so callers have a uniform read of the
    /// charged amount. Returns the payment amount.
    ///
    /// # Errors
    ///
    /// Rejects double finalization, unbound companies, and a negative
    /// excess (more debits than credits is a builder bug).
    pub fn finalize_for_payment(
        &mut self,
        payment_id: PaymentId,
        settlement: Option<Settlement>,
    ) -> Result<Decimal, LedgerError> {
        if self.payment_amount.is_some() {
            return Err(LedgerError::AlreadyFinalized);
        }
        if self.sales.is_empty() {
            return Err(LedgerError::NoSaleItems);
        }

        let excess = round_to_cent(self.excess_credit());
        if excess < Decimal::ZERO {
            return Err(LedgerError::Unbalanced {
                debit: excess.abs(),
                credit: Decimal::ZERO,
            });
        }

        self.extra_items.push(LineItem::debit(
            ItemType::Payment,
            Some(payment_id.into_inner()),
            excess,
        ));

        if excess > Decimal::ZERO {
            let company_id = self.company_id.ok_or(LedgerError::NoCompany)?;
            let settlement = settlement.ok_or(LedgerError::NoCompany)?;
            self.extra_items.push(
                LineItem::credit(
                    ItemType::Transfer,
                    Some(settlement.transfer_id.into_inner()),
                    excess,
                )
                .with_notes(json!({ "companyId": company_id })),
            );
            self.extra_items.push(LineItem::debit(
                ItemType::Account,
                Some(settlement.cogs_account_id.into_inner()),
                excess,
            ));
        }

        self.payment_amount = Some(excess);
        Ok(excess)
    }

    /// The payment amount fixed by `finalize_for_payment`.
    #[must_use]
    pub fn payment_amount(&self) -> Option<Decimal> {
        self.payment_amount
    }

    /// Verifies the quoted price still matches the finalized payment.
    ///
    /// # Errors
    ///
    /// Returns `PriceChanged` when the two differ by 1e-3 or more.
    pub fn check_expected_price(&self, expected: Option<Decimal>) -> Result<(), LedgerError> {
        let Some(expected) = expected else {
            return Ok(());
        };
        let actual = self.payment_amount.unwrap_or_else(|| self.excess_credit());
        if approx_eq(expected, actual, PRICE_EPSILON) {
            Ok(())
        } else {
            Err(LedgerError::PriceChanged { expected, actual })
        }
    }

    /// Records a compensating action to replay on failure.
    pub fn record_undo(&mut self, op: UndoOp) {
        self.undo_ops.push(op);
    }

    /// Records an entity status write to run after the journal persists.
    pub fn record_status_change(&mut self, change: StatusChange) {
        self.status_changes.push(change);
    }

    /// Validates the invariants and produces the final draft.
    ///
    /// # Errors
    ///
    /// Returns `Unbalanced` when debits and credits do not cancel within
    /// tolerance, or `NegativeAmount` when any item went negative.
    pub fn build(self, transaction_type: TransactionType) -> Result<TransactionDraft, LedgerError> {
        let mut items: Vec<LineItem> = Vec::with_capacity(self.sales.len() + self.extra_items.len());
        for sale in &self.sales {
            items.push(LineItem::credit(
                sale.item_type,
                Some(sale.item_id),
                sale.price,
            ));
        }
        items.extend(self.extra_items);

        for item in &items {
            if item.amount < Decimal::ZERO {
                return Err(LedgerError::NegativeAmount(item.amount));
            }
        }

        let debit: Decimal = items.iter().map(LineItem::debit_amount).sum();
        let credit: Decimal = items.iter().map(LineItem::credit_amount).sum();
        if !approx_eq(debit, credit, AMOUNT_EPSILON) {
            return Err(LedgerError::Unbalanced { debit, credit });
        }

        let sale_discounts = self
            .sales
            .iter()
            .filter(|s| s.discount_value > Decimal::ZERO)
            .map(|s| SaleDiscount {
                item_type: s.item_type,
                item_id: s.item_id,
                discount_value: s.discount_value,
            })
            .collect();

        Ok(TransactionDraft {
            transaction_type,
            description: self.description,
            creator: self.creator,
            committed: self.committed,
            dry_run: self.dry_run,
            company_id: self.company_id,
            items,
            undo_ops: self.undo_ops,
            status_changes: self.status_changes,
            sale_discounts,
        })
    }
}
