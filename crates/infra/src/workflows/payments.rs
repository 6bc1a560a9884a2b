use chrono::Utc;
use serde::Serialize;
use tracing::{Span, info, instrument};

use creditshop_core::{CustomerId, Money, UserId};
use creditshop_customers::{ContractStatus, MonthLabel, Payment, RecordPayment};
use creditshop_ledger::LedgerStatement;

use super::{WorkflowError, finish, write_failure};
use crate::store::{LedgerStore, LedgerTx};

/// Payment request as submitted by the payment form.
#[derive(Debug, Clone)]
pub struct RecordPaymentRequest {
    pub customer_id: String,
    pub month: String,
    pub amount: Option<Money>,
    pub actor: UserId,
}

/// What a recorded payment did to the customer's contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub status: ContractStatus,
    pub balance: Money,
    pub months_remaining: u32,
}

/// Records installment payments and closes contracts that are paid off.
#[derive(Debug, Clone)]
pub struct PaymentProcessor<S> {
    store: S,
}

impl<S: LedgerStore> PaymentProcessor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record one payment.
    ///
    /// Runs in a single transaction holding the customer's row lock:
    /// 1. insert the payment;
    /// 2. count one installment off `months_remaining` (floored at zero);
    /// 3. recompute the balance from items and payments;
    /// 4. close the contract iff the balance is exactly zero.
    ///
    /// A customer who never bought on credit cannot pay: `NotFound`.
    #[instrument(
        skip(self, req),
        fields(customer_id = %req.customer_id, month = %req.month, actor = %req.actor, balance = tracing::field::Empty),
        err
    )]
    pub async fn record_payment(&self, req: RecordPaymentRequest) -> Result<PaymentReceipt, WorkflowError> {
        let customer_id = CustomerId::parse(&req.customer_id)?;
        let month = MonthLabel::parse(&req.month)?;
        let amount = req
            .amount
            .ok_or_else(|| WorkflowError::validation("amount is required"))?;
        let now = Utc::now();
        let payment = Payment::record(RecordPayment {
            customer_id,
            month,
            amount,
            actor: req.actor,
            occurred_at: now,
        })?;

        let mut tx = self.store.begin().await?;
        let result = apply_payment(tx.as_mut(), payment, req.actor, now).await;
        let receipt = finish(tx, result).await?;

        Span::current().record("balance", tracing::field::display(receipt.balance));
        info!(
            payment_id = %receipt.payment.id,
            status = %receipt.status,
            months_remaining = receipt.months_remaining,
            "payment recorded"
        );
        Ok(receipt)
    }
}

async fn apply_payment(
    tx: &mut dyn LedgerTx,
    payment: Payment,
    actor: UserId,
    now: chrono::DateTime<Utc>,
) -> Result<PaymentReceipt, WorkflowError> {
    let customer_id = payment.customer_id.clone();
    let mut customer = tx
        .fetch_customer_for_update(&customer_id)
        .await?
        .ok_or_else(|| WorkflowError::not_found(format!("customer {customer_id} not found")))?;

    tx.insert_payment(&payment).await.map_err(write_failure)?;

    customer.record_installment(actor, now);
    tx.update_customer(&customer).await.map_err(write_failure)?;

    let items = tx.fetch_items_by_customer(&customer_id).await?;
    let payments = tx.fetch_payments_by_customer(&customer_id).await?;
    let statement = LedgerStatement::compute(&customer_id, &items, &payments)?;

    if statement.is_settled() {
        tx.update_contract_status(&customer_id, ContractStatus::OffContract)
            .await
            .map_err(write_failure)?;
        customer.close_contract(actor, now);
        info!(customer_id = %customer_id, "contract paid off");
    }

    Ok(PaymentReceipt {
        payment,
        status: customer.status,
        balance: statement.balance,
        months_remaining: customer.months_remaining,
    })
}
