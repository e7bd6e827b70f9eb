//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `TicketId` where a
//! `TripId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user.");
typed_id!(CompanyId, "Unique identifier for a transport company.");
typed_id!(RouteId, "Unique identifier for a route.");
typed_id!(TripId, "Unique identifier for a trip.");
typed_id!(TripStopId, "Unique identifier for a trip stop.");
typed_id!(StopId, "Unique identifier for a physical stop.");
typed_id!(TicketId, "Unique identifier for a ticket.");
typed_id!(RoutePassId, "Unique identifier for a route pass.");
typed_id!(TransactionId, "Unique identifier for a ledger transaction.");
typed_id!(
    TransactionItemId,
    "Unique identifier for a transaction line item."
);
typed_id!(PaymentId, "Unique identifier for a payment record.");
typed_id!(TransferId, "Unique identifier for a transfer record.");
typed_id!(AccountId, "Unique identifier for a ledger account.");
typed_id!(PromotionId, "Unique identifier for a promotion.");
