use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creditshop_core::{DomainError, DomainResult, Entity, Money, PurchaseId, Serial, UserId};

/// A direct (cash, non-credit) sale of stock.
///
/// Append-only; deleted only as the compensating step of the request that
/// created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub serial: Serial,
    pub quantity: u32,
    pub amount: Money,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Command: RecordPurchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPurchase {
    pub serial: Serial,
    pub quantity: u32,
    pub amount: Money,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Purchase {
    pub fn record(cmd: RecordPurchase) -> DomainResult<Self> {
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if cmd.amount.is_negative() {
            return Err(DomainError::validation("amount cannot be negative"));
        }

        Ok(Self {
            id: PurchaseId::new(),
            serial: cmd.serial,
            quantity: cmd.quantity,
            amount: cmd.amount,
            recorded_by: cmd.actor,
            created_at: cmd.occurred_at,
        })
    }
}

impl Entity for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
