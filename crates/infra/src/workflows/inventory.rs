use tracing::{info, instrument};

use creditshop_core::{Serial, UserId};

use super::{WorkflowError, finish, write_failure};
use crate::store::{LedgerStore, LedgerTx};

/// Applies signed quantity deltas to a product's stock count.
///
/// Stock never goes below zero: a decrease larger than the units on hand is
/// rejected with `InsufficientStock` and leaves the count unchanged.
#[derive(Debug, Clone)]
pub struct InventoryAdjuster<S> {
    store: S,
}

impl<S: LedgerStore> InventoryAdjuster<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `units := units - qty`. Returns the new unit count.
    #[instrument(skip(self, actor), fields(actor = %actor), err)]
    pub async fn decrease_quantity(&self, serial: &str, qty: u32, actor: UserId) -> Result<i64, WorkflowError> {
        let serial = parse_serial(serial)?;
        let mut tx = self.store.begin().await?;
        let result = decrease_in(tx.as_mut(), &serial, qty).await;
        finish(tx, result).await
    }

    /// `units := units + qty`. Returns the new unit count.
    #[instrument(skip(self, actor), fields(actor = %actor), err)]
    pub async fn increase_quantity(&self, serial: &str, qty: u32, actor: UserId) -> Result<i64, WorkflowError> {
        let serial = parse_serial(serial)?;
        let mut tx = self.store.begin().await?;
        let result = increase_in(tx.as_mut(), &serial, qty).await;
        finish(tx, result).await
    }

    /// Receive new stock for an existing product.
    #[instrument(skip(self, actor), fields(actor = %actor), err)]
    pub async fn restock(&self, serial: &str, qty: u32, actor: UserId) -> Result<i64, WorkflowError> {
        let serial = parse_serial(serial)?;
        let mut tx = self.store.begin().await?;
        let result: Result<i64, WorkflowError> = async {
            tx.fetch_product_for_update(&serial)
                .await?
                .ok_or_else(|| WorkflowError::not_found(format!("product {serial} not found")))?;
            increase_in(tx.as_mut(), &serial, qty).await
        }
        .await;
        let units = finish(tx, result).await?;
        info!(serial = %serial, qty, units, "product restocked");
        Ok(units)
    }
}

/// Decrease inside a caller-owned transaction.
pub(crate) async fn decrease_in(tx: &mut dyn LedgerTx, serial: &Serial, qty: u32) -> Result<i64, WorkflowError> {
    if qty == 0 {
        return Err(WorkflowError::validation("quantity must be greater than zero"));
    }
    tx.decrease_quantity(serial, qty).await.map_err(write_failure)
}

pub(crate) async fn increase_in(tx: &mut dyn LedgerTx, serial: &Serial, qty: u32) -> Result<i64, WorkflowError> {
    if qty == 0 {
        return Err(WorkflowError::validation("quantity must be greater than zero"));
    }
    tx.increase_quantity(serial, qty).await.map_err(write_failure)
}

fn parse_serial(raw: &str) -> Result<Serial, WorkflowError> {
    Ok(Serial::parse(raw)?)
}
