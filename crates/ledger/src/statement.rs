use serde::{Deserialize, Serialize};

use creditshop_core::{CustomerId, DomainError, DomainResult, Money};
use creditshop_customers::Payment;
use creditshop_sales::Item;

/// Derived view of one customer's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatement {
    pub customer_id: CustomerId,
    /// Sum of item balances (credit extended after deposits).
    pub charged: Money,
    /// Sum of payment amounts.
    pub paid: Money,
    /// `charged - paid`. Negative means the customer overpaid.
    pub balance: Money,
}

impl LedgerStatement {
    /// Fold a customer's items and payments into a statement.
    ///
    /// Rows belonging to other customers are ignored. A customer without any
    /// item never bought on credit and does not owe: that is `NotFound`, not
    /// a zero balance.
    pub fn compute(
        customer_id: &CustomerId,
        items: &[Item],
        payments: &[Payment],
    ) -> DomainResult<Self> {
        let mut owned_items = items.iter().filter(|i| &i.customer_id == customer_id).peekable();
        if owned_items.peek().is_none() {
            return Err(DomainError::not_found(format!(
                "customer with this id: {customer_id} does not owe"
            )));
        }

        let overflow = || DomainError::invariant(format!("ledger total for {customer_id} overflows"));
        let charged = Money::checked_sum(owned_items.map(|i| i.balance)).ok_or_else(overflow)?;
        let paid = Money::checked_sum(
            payments
                .iter()
                .filter(|p| &p.customer_id == customer_id)
                .map(|p| p.amount),
        )
        .ok_or_else(overflow)?;
        let balance = charged.checked_sub(paid).ok_or_else(overflow)?;

        Ok(Self {
            customer_id: customer_id.clone(),
            charged,
            paid,
            balance,
        })
    }

    /// Exactly zero minor units.
    pub fn is_settled(&self) -> bool {
        self.balance.is_zero()
    }
}

/// `Σ item.balance − Σ payment.amount` for `customer_id`.
pub fn outstanding_balance(
    customer_id: &CustomerId,
    items: &[Item],
    payments: &[Payment],
) -> DomainResult<Money> {
    LedgerStatement::compute(customer_id, items, payments).map(|s| s.balance)
}

/// Per-month installment for the remaining contract term.
///
/// `None` when no months remain.
pub fn installment(balance: Money, months_remaining: u32) -> Option<Money> {
    balance.div_round(months_remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use creditshop_core::{ItemId, PaymentId, Serial, UserId};
    use creditshop_customers::MonthLabel;

    fn c(id: &str) -> CustomerId {
        CustomerId::parse(id).unwrap()
    }

    fn item(customer: &str, balance: i64) -> Item {
        Item {
            id: ItemId::new(),
            customer_id: c(customer),
            serial: Serial::parse("P1").unwrap(),
            price: Money::from_minor(balance),
            quantity: 1,
            deposit: Money::ZERO,
            balance: Money::from_minor(balance),
            recorded_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(customer: &str, amount: i64) -> Payment {
        Payment {
            id: PaymentId::new(),
            customer_id: c(customer),
            month: MonthLabel::parse("January").unwrap(),
            amount: Money::from_minor(amount),
            recorded_by: UserId::new(),
            paid_at: Utc::now(),
        }
    }

    #[test]
    fn balance_is_items_minus_payments() {
        let items = vec![item("C001", 10_000), item("C001", 5_000)];
        let payments = vec![payment("C001", 3_000)];
        assert_eq!(
            outstanding_balance(&c("C001"), &items, &payments),
            Ok(Money::from_minor(12_000))
        );
    }

    #[test]
    fn customer_without_items_does_not_owe() {
        let payments = vec![payment("C002", 1_000)];
        let err = outstanding_balance(&c("C002"), &[item("C001", 10)], &payments).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn overpayment_is_negative_not_clamped() {
        let statement =
            LedgerStatement::compute(&c("C001"), &[item("C001", 1_000)], &[payment("C001", 1_500)])
                .unwrap();
        assert_eq!(statement.balance, Money::from_minor(-500));
        assert!(!statement.is_settled());
    }

    #[test]
    fn other_customers_rows_are_ignored() {
        let items = vec![item("C001", 1_000), item("C002", 9_000)];
        let payments = vec![payment("C002", 9_000), payment("C001", 1_000)];
        let statement = LedgerStatement::compute(&c("C001"), &items, &payments).unwrap();
        assert!(statement.is_settled());
        assert_eq!(statement.charged, Money::from_minor(1_000));
    }

    #[test]
    fn oversized_totals_are_rejected_not_wrapped() {
        let huge = i64::MAX / 2 + 1;
        let items = vec![item("C001", 10_000)];
        let payments = vec![payment("C001", huge), payment("C001", huge)];
        assert!(matches!(
            LedgerStatement::compute(&c("C001"), &items, &payments),
            Err(DomainError::InvariantViolation(_))
        ));

        let err = outstanding_balance(&c("C001"), &[item("C001", i64::MIN)], &[payment("C001", 1)])
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn installment_divides_remaining_balance() {
        assert_eq!(
            installment(Money::from_minor(20_000), 3),
            Some(Money::from_minor(6_667))
        );
        assert_eq!(installment(Money::from_minor(20_000), 0), None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 500, .. ProptestConfig::default() })]

            #[test]
            fn balance_matches_independent_sums(
                balances in proptest::collection::vec(-100_000i64..1_000_000, 1..20),
                amounts in proptest::collection::vec(1i64..1_000_000, 0..20),
            ) {
                let items: Vec<Item> = balances.iter().map(|b| item("C001", *b)).collect();
                let payments: Vec<Payment> = amounts.iter().map(|a| payment("C001", *a)).collect();
                let expected = balances.iter().sum::<i64>() - amounts.iter().sum::<i64>();
                let balance = outstanding_balance(&c("C001"), &items, &payments).unwrap();
                prop_assert_eq!(balance.minor(), expected);
            }
        }
    }
}
