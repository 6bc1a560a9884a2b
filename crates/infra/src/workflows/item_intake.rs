use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use creditshop_core::{CustomerId, Money, Serial, UserId};
use creditshop_sales::{CatalogSnapshot, Item, OpenItem};

use super::inventory::decrease_in;
use super::{WorkflowError, abort, finish, write_failure};
use crate::store::LedgerStore;

/// Credit sale request as submitted by the sale form.
#[derive(Debug, Clone)]
pub struct PostItem {
    pub customer_id: String,
    pub serial: String,
    /// Zero means the field was left empty.
    pub quantity: u32,
    pub deposit: Option<Money>,
    pub actor: UserId,
}

/// The recorded sale, with its display-only total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedItem {
    pub item: Item,
    pub total: Money,
    pub units_remaining: i64,
}

/// Records a credit sale and takes the goods out of stock.
#[derive(Debug, Clone)]
pub struct ItemIntake<S> {
    store: S,
}

impl<S: LedgerStore> ItemIntake<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Insert the item, then decrease stock, in one transaction.
    ///
    /// The unit price comes from `catalog`, the snapshot the form was built
    /// from, not from a fresh product read. If the stock decrease fails the
    /// just-inserted item is deleted again before the transaction is rolled
    /// back.
    #[instrument(
        skip(self, req, catalog),
        fields(customer_id = %req.customer_id, serial = %req.serial, quantity = req.quantity, actor = %req.actor),
        err
    )]
    pub async fn post_item(
        &self,
        req: PostItem,
        catalog: &CatalogSnapshot,
    ) -> Result<PostedItem, WorkflowError> {
        let customer_id = CustomerId::parse(&req.customer_id)?;
        let serial = Serial::parse(&req.serial)?;
        if req.quantity == 0 {
            return Err(WorkflowError::validation("quantity is required"));
        }
        let deposit = req
            .deposit
            .ok_or_else(|| WorkflowError::validation("deposit amount is required"))?;

        let unit_price = catalog.price_of(&serial)?;
        let item = Item::open(OpenItem {
            customer_id,
            serial,
            unit_price,
            quantity: req.quantity,
            deposit,
            actor: req.actor,
            occurred_at: Utc::now(),
        })?;

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.insert_item(&item).await {
            return Err(abort(tx, write_failure(err)).await);
        }

        let units_remaining = match decrease_in(tx.as_mut(), &item.serial, item.quantity).await {
            Ok(units) => units,
            Err(err) => {
                warn!(item_id = %item.id, error = %err, "stock decrease failed; removing item");
                if let Err(cleanup) = tx.delete_item(&item.id).await {
                    error!(
                        item_id = %item.id,
                        customer_id = %item.customer_id,
                        error = %cleanup,
                        "compensating item delete failed"
                    );
                }
                return Err(abort(tx, err).await);
            }
        };

        let total = item.total();
        let posted = finish(
            tx,
            Ok(PostedItem {
                item,
                total,
                units_remaining,
            }),
        )
        .await?;

        info!(item_id = %posted.item.id, balance = %posted.item.balance, "credit sale recorded");
        Ok(posted)
    }
}
