//! Strongly-typed identifiers used across the domain.
//!
//! Two families live here:
//! - business keys assigned by staff (`CustomerId`, `Serial`), kept as trimmed,
//!   non-empty strings and ordered lexically;
//! - surrogate row identifiers (`ItemId`, `PaymentId`, `PurchaseId`) and the
//!   acting user (`UserId`), backed by UUIDv7.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a staff user (the actor recorded on every write).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of a credit-sale line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

/// Identifier of a recorded payment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

/// Identifier of a direct (non-credit) purchase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
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

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s.trim())
                    .map_err(|e| DomainError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(ItemId, "ItemId");
impl_uuid_newtype!(PaymentId, "PaymentId");
impl_uuid_newtype!(PurchaseId, "PurchaseId");

/// Customer business key (unique, user-assigned, e.g. a national ID number).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(String);

/// Product business key (unique serial number).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(String);

macro_rules! impl_business_key {
    ($t:ty, $field:literal) => {
        impl $t {
            /// Parse a raw form value: surrounding whitespace is dropped and the
            /// remainder must be non-empty.
            pub fn parse(raw: &str) -> Result<Self, DomainError> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::validation(concat!($field, " is required")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_business_key!(CustomerId, "customer id");
impl_business_key!(Serial, "serial");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_keys_are_trimmed() {
        let id = CustomerId::parse("  C001 ").unwrap();
        assert_eq!(id.as_str(), "C001");
    }

    #[test]
    fn empty_business_key_is_a_validation_error() {
        assert!(matches!(CustomerId::parse("   "), Err(DomainError::Validation(_))));
        assert!(matches!(Serial::parse(""), Err(DomainError::Validation(_))));
    }

    #[test]
    fn serials_order_lexically() {
        let mut serials = vec![
            Serial::parse("P10").unwrap(),
            Serial::parse("P02").unwrap(),
            Serial::parse("A99").unwrap(),
        ];
        serials.sort();
        let raw: Vec<_> = serials.iter().map(Serial::as_str).collect();
        assert_eq!(raw, vec!["A99", "P02", "P10"]);
    }

    #[test]
    fn business_key_deserialization_rejects_blank() {
        let err = serde_json::from_str::<CustomerId>("\"  \"");
        assert!(err.is_err());
        let ok: Serial = serde_json::from_str("\"P1\"").unwrap();
        assert_eq!(ok.as_str(), "P1");
    }

    #[test]
    fn uuid_ids_round_trip_through_display() {
        let id = ItemId::new();
        let parsed: ItemId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
