use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creditshop_core::{DomainError, DomainResult, Entity, Money, Serial, UserId};

/// Catalog entry.
///
/// `price` is the unit price at catalog time, in the smallest currency unit.
/// `units` is the on-hand stock count and never drops below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub serial: Serial,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub units: i64,
    pub updated_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub serial: Serial,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub units: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct.
///
/// Replaces every editable catalog field. `serial` and `created_at` never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub units: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

fn validate_fields(name: &str, price: Money, units: i64) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if price.is_negative() {
        return Err(DomainError::validation("price cannot be negative"));
    }
    if units < 0 {
        return Err(DomainError::validation("units cannot be negative"));
    }
    Ok(())
}

impl Product {
    pub fn register(cmd: RegisterProduct) -> DomainResult<Self> {
        validate_fields(&cmd.name, cmd.price, cmd.units)?;

        Ok(Self {
            serial: cmd.serial,
            name: cmd.name.trim().to_string(),
            description: cmd.description,
            price: cmd.price,
            units: cmd.units,
            updated_by: cmd.actor,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    /// Apply a catalog edit. On error the product is left untouched.
    pub fn update(&mut self, cmd: UpdateProduct) -> DomainResult<()> {
        validate_fields(&cmd.name, cmd.price, cmd.units)?;

        self.name = cmd.name.trim().to_string();
        self.description = cmd.description;
        self.price = cmd.price;
        self.units = cmd.units;
        self.updated_by = cmd.actor;
        self.updated_at = cmd.occurred_at;
        Ok(())
    }

    pub fn in_stock(&self) -> bool {
        self.units > 0
    }
}

impl Entity for Product {
    type Id = Serial;

    fn id(&self) -> &Self::Id {
        &self.serial
    }
}
