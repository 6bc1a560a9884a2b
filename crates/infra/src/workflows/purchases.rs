use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use creditshop_core::{Money, Serial, UserId};
use creditshop_products::{Purchase, RecordPurchase};

use super::inventory::decrease_in;
use super::{WorkflowError, abort, finish, write_failure};
use crate::store::LedgerStore;

/// Direct (cash) sale request.
#[derive(Debug, Clone)]
pub struct RecordPurchaseRequest {
    pub serial: String,
    /// Zero means the field was left empty.
    pub quantity: u32,
    pub amount: Option<Money>,
    pub actor: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedPurchase {
    pub purchase: Purchase,
    pub units_remaining: i64,
}

/// Records direct sales. Same shape as credit intake: insert, then take the
/// goods out of stock, deleting the purchase again if that fails.
#[derive(Debug, Clone)]
pub struct PurchaseRecorder<S> {
    store: S,
}

impl<S: LedgerStore> PurchaseRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, req),
        fields(serial = %req.serial, quantity = req.quantity, actor = %req.actor),
        err
    )]
    pub async fn record_purchase(&self, req: RecordPurchaseRequest) -> Result<RecordedPurchase, WorkflowError> {
        let serial = Serial::parse(&req.serial)?;
        let amount = req
            .amount
            .ok_or_else(|| WorkflowError::validation("amount is required"))?;
        let purchase = Purchase::record(RecordPurchase {
            serial,
            quantity: req.quantity,
            amount,
            actor: req.actor,
            occurred_at: Utc::now(),
        })?;

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.insert_purchase(&purchase).await {
            return Err(abort(tx, write_failure(err)).await);
        }

        let units_remaining = match decrease_in(tx.as_mut(), &purchase.serial, purchase.quantity).await {
            Ok(units) => units,
            Err(err) => {
                warn!(purchase_id = %purchase.id, error = %err, "stock decrease failed; removing purchase");
                if let Err(cleanup) = tx.delete_purchase(&purchase.id).await {
                    error!(
                        purchase_id = %purchase.id,
                        serial = %purchase.serial,
                        error = %cleanup,
                        "compensating purchase delete failed"
                    );
                }
                return Err(abort(tx, err).await);
            }
        };

        let recorded = finish(
            tx,
            Ok(RecordedPurchase {
                purchase,
                units_remaining,
            }),
        )
        .await?;
        info!(purchase_id = %recorded.purchase.id, units_remaining, "purchase recorded");
        Ok(recorded)
    }
}
