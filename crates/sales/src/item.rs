use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creditshop_core::{CustomerId, DomainError, DomainResult, Entity, ItemId, Money, Serial, UserId};

/// One credit-sale line.
///
/// `price` is snapshotted at sale time. `balance = quantity * price - deposit`
/// and may be negative when the deposit exceeds the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub customer_id: CustomerId,
    pub serial: Serial,
    pub price: Money,
    pub quantity: u32,
    pub deposit: Money,
    pub balance: Money,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Command: OpenItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenItem {
    pub customer_id: CustomerId,
    pub serial: Serial,
    pub unit_price: Money,
    pub quantity: u32,
    pub deposit: Money,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CorrectItem.
///
/// The explicit update path for a mis-keyed sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectItem {
    pub unit_price: Money,
    pub quantity: u32,
    pub deposit: Money,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

fn check_terms(unit_price: Money, quantity: u32, deposit: Money) -> DomainResult<Money> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    if unit_price.is_negative() {
        return Err(DomainError::validation("price cannot be negative"));
    }
    if deposit.is_negative() {
        return Err(DomainError::validation("deposit cannot be negative"));
    }
    unit_price.times(quantity)
}

impl Item {
    pub fn open(cmd: OpenItem) -> DomainResult<Self> {
        let total = check_terms(cmd.unit_price, cmd.quantity, cmd.deposit)?;

        Ok(Self {
            id: ItemId::new(),
            customer_id: cmd.customer_id,
            serial: cmd.serial,
            price: cmd.unit_price,
            quantity: cmd.quantity,
            deposit: cmd.deposit,
            balance: total - cmd.deposit,
            recorded_by: cmd.actor,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    /// `quantity * price`. Display-only; not persisted.
    pub fn total(&self) -> Money {
        Money::from_minor(self.price.minor() * i64::from(self.quantity))
    }

    pub fn correct(&mut self, cmd: CorrectItem) -> DomainResult<()> {
        let total = check_terms(cmd.unit_price, cmd.quantity, cmd.deposit)?;

        self.price = cmd.unit_price;
        self.quantity = cmd.quantity;
        self.deposit = cmd.deposit;
        self.balance = total - cmd.deposit;
        self.recorded_by = cmd.actor;
        self.updated_at = cmd.occurred_at;
        Ok(())
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
