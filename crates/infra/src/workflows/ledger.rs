use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::instrument;

use creditshop_core::{CustomerId, DomainError, Money};
use creditshop_customers::Customer;
use creditshop_ledger::{LedgerStatement, installment};

use super::WorkflowError;
use crate::store::LedgerStore;

/// Derives outstanding balances from committed items and payments.
///
/// Read-only: takes no locks and may run concurrently with anything.
#[derive(Debug, Clone)]
pub struct LedgerCalculator<S> {
    store: S,
}

/// Balance plus the per-month installment still due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebtSummary {
    pub customer: Customer,
    pub statement: LedgerStatement,
    /// `None` once no months remain on the contract.
    pub installment: Option<Money>,
}

/// A customer whose installment falls due today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwingCustomer {
    pub customer: Customer,
    pub balance: Money,
    pub installment: Option<Money>,
}

impl<S: LedgerStore> LedgerCalculator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `Σ item.balance − Σ payment.amount` for the customer.
    ///
    /// Negative when the customer overpaid. `NotFound` when the customer never
    /// bought on credit.
    pub async fn compute_balance(&self, customer_id: &str) -> Result<Money, WorkflowError> {
        Ok(self.statement(customer_id).await?.balance)
    }

    #[instrument(skip(self), err)]
    pub async fn statement(&self, customer_id: &str) -> Result<LedgerStatement, WorkflowError> {
        let customer_id = parse_customer_id(customer_id)?;
        let items = self.store.fetch_items_by_customer(&customer_id).await?;
        let payments = self.store.fetch_payments_by_customer(&customer_id).await?;
        Ok(LedgerStatement::compute(&customer_id, &items, &payments)?)
    }

    /// Balance and installment for the debt lookup screen.
    #[instrument(skip(self), err)]
    pub async fn debt_summary(&self, customer_id: &str) -> Result<DebtSummary, WorkflowError> {
        let id = parse_customer_id(customer_id)?;
        let customer = self
            .store
            .fetch_customer(&id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("customer {id} not found")))?;
        let statement = self.statement(customer_id).await?;
        let installment = installment(statement.balance, customer.months_remaining);

        Ok(DebtSummary {
            customer,
            statement,
            installment,
        })
    }

    /// Open contracts whose monthly due day is `today`.
    ///
    /// The due day is the day-of-month the contract was signed; contracts
    /// signed on a day the current month lacks fall due on its last day.
    /// Customers without credit items are skipped.
    #[instrument(skip(self), fields(today = %today), err)]
    pub async fn owing_today(&self, today: NaiveDate) -> Result<Vec<OwingCustomer>, WorkflowError> {
        let customers = self.store.fetch_customers_on_contract().await?;
        let mut owing = Vec::new();

        for customer in customers {
            if !falls_due_on(customer.created_at.day(), today) {
                continue;
            }
            let items = self.store.fetch_items_by_customer(&customer.customer_id).await?;
            let payments = self
                .store
                .fetch_payments_by_customer(&customer.customer_id)
                .await?;
            let statement = match LedgerStatement::compute(&customer.customer_id, &items, &payments) {
                Ok(statement) => statement,
                Err(DomainError::NotFound(_)) => continue,
                Err(other) => return Err(other.into()),
            };
            owing.push(OwingCustomer {
                installment: installment(statement.balance, customer.months_remaining),
                balance: statement.balance,
                customer,
            });
        }

        Ok(owing)
    }
}

fn parse_customer_id(raw: &str) -> Result<CustomerId, WorkflowError> {
    CustomerId::parse(raw).map_err(|_| WorkflowError::validation("customer ID not provided"))
}

fn falls_due_on(signing_day: u32, today: NaiveDate) -> bool {
    if signing_day == today.day() {
        return true;
    }
    let last_of_month = today
        .succ_opt()
        .map(|next| next.month() != today.month())
        .unwrap_or(true);
    last_of_month && signing_day > today.day()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;
    use crate::workflows::fixtures::{Seed, money};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn balance_is_items_minus_payments() {
        let store = InMemoryLedgerStore::new();
        Seed::new(&store)
            .customer("C001", 6)
            .product("P1", 10, 10_000)
            .item("C001", "P1", 10_000)
            .item("C001", "P1", 5_000)
            .payment("C001", 3_000)
            .commit()
            .await;

        let calculator = LedgerCalculator::new(store);
        assert_eq!(calculator.compute_balance("C001").await, Ok(money(12_000)));
    }

    #[tokio::test]
    async fn empty_customer_id_is_validation_error() {
        let calculator = LedgerCalculator::new(InMemoryLedgerStore::new());
        assert_eq!(
            calculator.compute_balance("  ").await,
            Err(WorkflowError::validation("customer ID not provided"))
        );
    }

    #[tokio::test]
    async fn customer_without_items_does_not_owe() {
        let store = InMemoryLedgerStore::new();
        Seed::new(&store).customer("C009", 3).commit().await;

        let calculator = LedgerCalculator::new(store);
        assert!(matches!(
            calculator.compute_balance("C009").await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn debt_summary_splits_balance_over_remaining_months() {
        let store = InMemoryLedgerStore::new();
        Seed::new(&store)
            .customer("C001", 3)
            .product("P1", 10, 20_000)
            .item("C001", "P1", 20_000)
            .commit()
            .await;

        let summary = LedgerCalculator::new(store).debt_summary("C001").await.unwrap();
        assert_eq!(summary.statement.balance, money(20_000));
        assert_eq!(summary.installment, Some(money(6_667)));
    }

    #[tokio::test]
    async fn debt_summary_without_months_has_no_installment() {
        let store = InMemoryLedgerStore::new();
        Seed::new(&store)
            .customer("C001", 0)
            .product("P1", 10, 1_000)
            .item("C001", "P1", 1_000)
            .commit()
            .await;

        let summary = LedgerCalculator::new(store).debt_summary("C001").await.unwrap();
        assert_eq!(summary.installment, None);
    }

    #[tokio::test]
    async fn owing_today_matches_signing_day() {
        let store = InMemoryLedgerStore::new();
        let signed_15th = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        let signed_3rd = Utc.with_ymd_and_hms(2026, 1, 3, 9, 0, 0).unwrap();
        Seed::new(&store)
            .customer_signed("C001", 4, signed_15th)
            .customer_signed("C002", 4, signed_3rd)
            .customer_signed("C003", 4, signed_15th)
            .product("P1", 10, 4_000)
            .item("C001", "P1", 4_000)
            .item("C002", "P1", 4_000)
            .commit()
            .await;

        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let owing = LedgerCalculator::new(store).owing_today(today).await.unwrap();

        let ids: Vec<&str> = owing.iter().map(|o| o.customer.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["C001"]);
        assert_eq!(owing[0].installment, Some(money(1_000)));
    }

    #[test]
    fn late_signing_days_fall_due_at_month_end() {
        let feb_28 = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let feb_27 = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        assert!(falls_due_on(31, feb_28));
        assert!(falls_due_on(28, feb_28));
        assert!(!falls_due_on(31, feb_27));
        assert!(!falls_due_on(1, feb_28));
    }
}
