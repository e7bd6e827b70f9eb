//! The payment gateway interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use farebox_shared::AppError;

/// The card a charge is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSource {
    /// Gateway token or saved source id.
    pub token: String,
    /// Issuing country (ISO 3166), when the gateway reports it.
    pub country: Option<String>,
    /// Card brand, when the gateway reports it.
    pub brand: Option<String>,
}

/// A charge request routed to a merchant destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Amount in cents.
    pub amount_cents: i64,
    /// Free-form description stored gateway-side.
    pub description: String,
    /// Statement descriptor shown on the cardholder's statement.
    pub statement_descriptor: String,
    /// Merchant account the funds route to.
    pub destination: String,
    /// Idempotency key; repeated calls with the same key are the same
    /// operation.
    pub idempotency_key: String,
    /// The card to charge.
    pub source: CardSource,
}

/// A gateway-side charge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Gateway charge id.
    pub id: String,
    /// Captured amount in cents.
    pub amount_cents: i64,
    /// Amount already refunded, in cents.
    pub amount_refunded_cents: i64,
    /// The card charged.
    pub source: CardSource,
}

impl Charge {
    /// Cents still refundable on this charge.
    #[must_use]
    pub fn balance_cents(&self) -> i64 {
        self.amount_cents - self.amount_refunded_cents
    }
}

/// A refund request against an existing charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    /// The charge to refund.
    pub charge_id: String,
    /// Amount in cents.
    pub amount_cents: i64,
    /// Idempotency key.
    pub idempotency_key: String,
}

/// A gateway-side refund record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    /// Gateway refund id.
    pub id: String,
    /// Refunded amount in cents.
    pub amount_cents: i64,
}

/// Gateway failures.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum GatewayError {
    /// The gateway declined the operation.
    #[error("Gateway declined: {0}")]
    Declined(String),

    /// The gateway could not be reached.
    #[error("Gateway unreachable: {0}")]
    Unavailable(String),

    /// The referenced charge does not exist.
    #[error("Charge not found: {0}")]
    ChargeNotFound(String),

    /// The refund exceeds the charge's remaining balance.
    #[error("Refund exceeds remaining balance on charge {0}")]
    InsufficientBalance(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::Charge(err.to_string())
    }
}

/// Narrow interface to the external card-payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures a charge. Repeated calls with the same idempotency key
    /// return the original charge without moving money again.
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError>;

    /// Refunds part or all of a charge, idempotently.
    async fn refund(&self, request: RefundRequest) -> Result<GatewayRefund, GatewayError>;

    /// Fetches the current state of a charge.
    async fn retrieve_charge(&self, charge_id: &str) -> Result<Charge, GatewayError>;
}
