//! Seeding helpers for workflow tests.

use chrono::{DateTime, Duration, Utc};

use creditshop_core::{CustomerId, Money, Serial, UserId};
use creditshop_customers::{
    ContactDetails, Customer, CustomerImages, MonthLabel, Payment, RecordPayment, RegisterCustomer,
};
use creditshop_products::{Product, RegisterProduct};
use creditshop_sales::{CatalogSnapshot, Item, OpenItem};

use crate::store::LedgerStore;

pub(crate) fn money(minor: i64) -> Money {
    Money::from_minor(minor)
}

pub(crate) fn customer_id(raw: &str) -> CustomerId {
    CustomerId::parse(raw).unwrap()
}

pub(crate) fn serial(raw: &str) -> Serial {
    Serial::parse(raw).unwrap()
}

pub(crate) fn contact() -> ContactDetails {
    ContactDetails {
        first_name: "Ama".to_string(),
        last_name: "Mensah".to_string(),
        phone: "0244000000".to_string(),
        location: "Kumasi".to_string(),
        ..ContactDetails::default()
    }
}

pub(crate) fn catalog(entries: &[(&str, i64)]) -> CatalogSnapshot {
    entries
        .iter()
        .fold(CatalogSnapshot::new(), |snapshot, (s, price)| {
            snapshot.with_price(serial(s), money(*price))
        })
}

/// Rows to write in one committed transaction.
pub(crate) struct Seed<'a, S> {
    store: &'a S,
    actor: UserId,
    base: DateTime<Utc>,
    customers: Vec<Customer>,
    products: Vec<Product>,
    items: Vec<Item>,
    payments: Vec<Payment>,
}

impl<'a, S: LedgerStore> Seed<'a, S> {
    pub(crate) fn new(store: &'a S) -> Self {
        Self {
            store,
            actor: UserId::new(),
            base: Utc::now(),
            customers: Vec::new(),
            products: Vec::new(),
            items: Vec::new(),
            payments: Vec::new(),
        }
    }

    fn tick(&self) -> DateTime<Utc> {
        let n = self.items.len() + self.payments.len();
        self.base + Duration::seconds(n as i64)
    }

    pub(crate) fn customer(self, id: &str, months: u32) -> Self {
        let at = self.base;
        self.customer_signed(id, months, at)
    }

    pub(crate) fn customer_signed(mut self, id: &str, months: u32, signed_at: DateTime<Utc>) -> Self {
        let customer = Customer::register(RegisterCustomer {
            customer_id: customer_id(id),
            contact: contact(),
            agreement: "12 month hire purchase".to_string(),
            months,
            images: CustomerImages::default(),
            actor: self.actor,
            occurred_at: signed_at,
        })
        .unwrap();
        self.customers.push(customer);
        self
    }

    pub(crate) fn product(mut self, s: &str, units: i64, price: i64) -> Self {
        let product = Product::register(RegisterProduct {
            serial: serial(s),
            name: format!("Product {s}"),
            description: String::new(),
            price: money(price),
            units,
            actor: self.actor,
            occurred_at: self.base,
        })
        .unwrap();
        self.products.push(product);
        self
    }

    /// One unit at `balance`, no deposit.
    pub(crate) fn item(mut self, customer: &str, s: &str, balance: i64) -> Self {
        let item = Item::open(OpenItem {
            customer_id: customer_id(customer),
            serial: serial(s),
            unit_price: money(balance),
            quantity: 1,
            deposit: Money::ZERO,
            actor: self.actor,
            occurred_at: self.tick(),
        })
        .unwrap();
        self.items.push(item);
        self
    }

    pub(crate) fn payment(mut self, customer: &str, amount: i64) -> Self {
        let payment = Payment::record(RecordPayment {
            customer_id: customer_id(customer),
            month: MonthLabel::parse("January").unwrap(),
            amount: money(amount),
            actor: self.actor,
            occurred_at: self.tick(),
        })
        .unwrap();
        self.payments.push(payment);
        self
    }

    pub(crate) async fn commit(self) {
        let mut tx = self.store.begin().await.unwrap();
        for customer in &self.customers {
            tx.insert_customer(customer).await.unwrap();
        }
        for product in &self.products {
            tx.insert_product(product).await.unwrap();
        }
        for item in &self.items {
            tx.insert_item(item).await.unwrap();
        }
        for payment in &self.payments {
            tx.insert_payment(payment).await.unwrap();
        }
        tx.commit().await.unwrap();
    }
}
