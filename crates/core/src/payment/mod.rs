//! Payment gateway seam and money-movement math.
//!
//! The gateway itself is a black-box HTTPS service; this module defines
//! the narrow interface workflows program against, the fee schedule, the
//! idempotency-key and statement-descriptor formats, and refund sizing.

pub mod descriptor;
pub mod fees;
pub mod gateway;
pub mod idempotency;
pub mod mock;
pub mod refund;

pub use descriptor::statement_descriptor;
pub use fees::{
    admin_fee_cents, is_local_and_non_amex, is_micro, min_transaction_charge_cents,
};
pub use gateway::{
    CardSource, Charge, ChargeRequest, GatewayError, GatewayRefund, PaymentGateway, RefundRequest,
};
pub use idempotency::{booking_key, refund_key, RefundTarget};
pub use mock::MockGateway;
pub use refund::{generate_refund_info, RefundInfo, RefundInfoError};
