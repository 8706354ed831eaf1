//! Strongly-typed identifiers used across the domain.
//!
//! Persisted rows are keyed by database-assigned `i64` ids; the acting user
//! is identified by the UUID handed over by the auth layer.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a user (actor identity, supplied by upstream auth).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new identifier (UUIDv7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::validation(format!("UserId: {e}")))?;
        Ok(Self(uuid))
    }
}

macro_rules! impl_row_id {
    ($t:ident, $name:literal) => {
        #[doc = concat!("Row identifier of a ", $name, ".")]
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::validation(format!("{} id: {}", $name, e)))?;
                Ok(Self(raw))
            }
        }
    };
}

impl_row_id!(ItemId, "item");
impl_row_id!(WarehouseId, "warehouse");
impl_row_id!(CustomerId, "customer");
impl_row_id!(InvoiceId, "invoice");
impl_row_id!(PaymentId, "payment");
impl_row_id!(AllocationId, "payment allocation");
impl_row_id!(MovementId, "stock movement");
impl_row_id!(LedgerEntryId, "customer ledger entry");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_parse_and_display() {
        let id: InvoiceId = " 42 ".parse().unwrap();
        assert_eq!(id, InvoiceId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<InvoiceId>().is_err());
    }

    #[test]
    fn row_ids_are_serde_transparent() {
        let json = serde_json::to_string(&WarehouseId::new(3)).unwrap();
        assert_eq!(json, "3");
    }
}
