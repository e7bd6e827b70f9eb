//! In-memory gateway for tests and property checks.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::gateway::{
    Charge, ChargeRequest, GatewayError, GatewayRefund, PaymentGateway, RefundRequest,
};

#[derive(Debug, Default)]
struct MockState {
    charges: HashMap<String, Charge>,
    charge_by_key: HashMap<String, String>,
    refund_by_key: HashMap<String, GatewayRefund>,
    fail_next: Option<GatewayError>,
    charge_calls: u32,
    charges_created: u32,
    refund_calls: u32,
    next_id: u32,
}

/// A scriptable in-memory [`PaymentGateway`].
///
/// Behaves like the real thing for idempotency: repeated calls with the
/// same key return the original record without creating a second charge
/// or refund.
#[derive(Debug, Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next charge or refund call fail with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.state.lock().expect("mock poisoned").fail_next = Some(error);
    }

    /// Number of `charge` calls received.
    #[must_use]
    pub fn charge_calls(&self) -> u32 {
        self.state.lock().expect("mock poisoned").charge_calls
    }

    /// Number of distinct charges actually created.
    #[must_use]
    pub fn charges_created(&self) -> u32 {
        self.state.lock().expect("mock poisoned").charges_created
    }

    /// Number of `refund` calls received.
    #[must_use]
    pub fn refund_calls(&self) -> u32 {
        self.state.lock().expect("mock poisoned").refund_calls
    }

    /// Seeds an existing charge, for refund tests.
    pub fn seed_charge(&self, charge: Charge) {
        let mut state = self.state.lock().expect("mock poisoned");
        state.charges.insert(charge.id.clone(), charge);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError> {
        let mut state = self.state.lock().expect("mock poisoned");
        state.charge_calls += 1;

        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        if let Some(id) = state.charge_by_key.get(&request.idempotency_key) {
            let charge = state.charges[id].clone();
            return Ok(charge);
        }

        state.next_id += 1;
        state.charges_created += 1;
        let charge = Charge {
            id: format!("ch_mock_{}", state.next_id),
            amount_cents: request.amount_cents,
            amount_refunded_cents: 0,
            source: request.source,
        };
        state.charges.insert(charge.id.clone(), charge.clone());
        state
            .charge_by_key
            .insert(request.idempotency_key, charge.id.clone());
        Ok(charge)
    }

    async fn refund(&self, request: RefundRequest) -> Result<GatewayRefund, GatewayError> {
        let mut state = self.state.lock().expect("mock poisoned");
        state.refund_calls += 1;

        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        if let Some(refund) = state.refund_by_key.get(&request.idempotency_key) {
            return Ok(refund.clone());
        }

        let charge = state
            .charges
            .get_mut(&request.charge_id)
            .ok_or_else(|| GatewayError::ChargeNotFound(request.charge_id.clone()))?;
        if charge.balance_cents() < request.amount_cents {
            return Err(GatewayError::InsufficientBalance(request.charge_id.clone()));
        }
        charge.amount_refunded_cents += request.amount_cents;

        state.next_id += 1;
        let refund = GatewayRefund {
            id: format!("re_mock_{}", state.next_id),
            amount_cents: request.amount_cents,
        };
        state
            .refund_by_key
            .insert(request.idempotency_key, refund.clone());
        Ok(refund)
    }

    async fn retrieve_charge(&self, charge_id: &str) -> Result<Charge, GatewayError> {
        let state = self.state.lock().expect("mock poisoned");
        state
            .charges
            .get(charge_id)
            .cloned()
            .ok_or_else(|| GatewayError::ChargeNotFound(charge_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::gateway::CardSource;

    fn request(key: &str) -> ChargeRequest {
        ChargeRequest {
            amount_cents: 1500,
            description: "2 tickets".to_string(),
            statement_descriptor: "AMBR,Ref#123".to_string(),
            destination: "acct_mock".to_string(),
            idempotency_key: key.to_string(),
            source: CardSource {
                token: "tok".to_string(),
                country: Some("SG".to_string()),
                brand: Some("Visa".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_same_key_creates_one_charge() {
        let gw = MockGateway::new();
        let a = gw.charge(request("instance=t,bookingId=1,session=9")).await.unwrap();
        let b = gw.charge(request("instance=t,bookingId=1,session=9")).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(gw.charge_calls(), 2);
        assert_eq!(gw.charges_created(), 1);
    }

    #[tokio::test]
    async fn test_different_keys_create_distinct_charges() {
        let gw = MockGateway::new();
        let a = gw.charge(request("instance=t,bookingId=1,session=9")).await.unwrap();
        let b = gw.charge(request("instance=t,bookingId=2,session=9")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(gw.charges_created(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failure_consumed_once() {
        let gw = MockGateway::new();
        gw.fail_next(GatewayError::Declined("card_declined".to_string()));
        assert!(gw.charge(request("k1")).await.is_err());
        assert!(gw.charge(request("k1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_refund_updates_balance_idempotently() {
        let gw = MockGateway::new();
        let charge = gw.charge(request("k1")).await.unwrap();

        let refund_req = RefundRequest {
            charge_id: charge.id.clone(),
            amount_cents: 500,
            idempotency_key: "Refund:instance=t,ticketId=a".to_string(),
        };
        let first = gw.refund(refund_req.clone()).await.unwrap();
        let second = gw.refund(refund_req).await.unwrap();
        assert_eq!(first.id, second.id);

        let after = gw.retrieve_charge(&charge.id).await.unwrap();
        assert_eq!(after.amount_refunded_cents, 500);
        assert_eq!(after.balance_cents(), 1000);
    }

    #[tokio::test]
    async fn test_refund_over_balance_rejected() {
        let gw = MockGateway::new();
        let charge = gw.charge(request("k1")).await.unwrap();
        let err = gw
            .refund(RefundRequest {
                charge_id: charge.id,
                amount_cents: 2000,
                idempotency_key: "Refund:instance=t,ticketId=b".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InsufficientBalance(_)));
    }
}
