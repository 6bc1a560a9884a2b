use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use creditshop_core::{CustomerId, Entity, ItemId, PaymentId, PurchaseId, Serial};
use creditshop_customers::{ContractStatus, Customer, Payment, Witness};
use creditshop_products::{Product, Purchase, StockAdjustment};
use creditshop_sales::Item;

use super::{LedgerStore, LedgerTx, Page, StoreError};

/// How long `begin` waits for the writer lock before giving up.
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    products: BTreeMap<Serial, Product>,
    items: BTreeMap<ItemId, Item>,
    payments: BTreeMap<PaymentId, Payment>,
    purchases: BTreeMap<PurchaseId, Purchase>,
    witnesses: BTreeMap<CustomerId, Witness>,
}

impl Tables {
    fn items_of(&self, customer_id: &CustomerId) -> Vec<Item> {
        let mut rows: Vec<Item> = self
            .items
            .values()
            .filter(|i| &i.customer_id == customer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        rows
    }

    fn payments_of(&self, customer_id: &CustomerId) -> Vec<Payment> {
        let mut rows: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| &p.customer_id == customer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.paid_at, a.id).cmp(&(b.paid_at, b.id)));
        rows
    }

    fn adjust_units(&mut self, serial: &Serial, adjustment: StockAdjustment) -> Result<i64, StoreError> {
        let product = self
            .products
            .get_mut(serial)
            .ok_or_else(|| StoreError::NotFound(format!("product {serial}")))?;
        let next = adjustment.apply_to(serial, product.units)?;
        product.units = next;
        Ok(next)
    }
}

fn insert_unique<E>(table: &mut BTreeMap<E::Id, E>, row: &E, kind: &str) -> Result<(), StoreError>
where
    E: Entity + Clone,
{
    if table.contains_key(row.id()) {
        return Err(StoreError::Conflict(format!(
            "{kind} {:?} already exists",
            row.id()
        )));
    }
    table.insert(row.id().clone(), row.clone());
    Ok(())
}

fn replace_existing<E>(table: &mut BTreeMap<E::Id, E>, row: &E, kind: &str) -> Result<(), StoreError>
where
    E: Entity + Clone,
{
    match table.get_mut(row.id()) {
        Some(slot) => {
            *slot = row.clone();
            Ok(())
        }
        None => Err(StoreError::NotFound(format!("{kind} {:?}", row.id()))),
    }
}

fn page_of<T: Clone>(rows: Vec<T>, page: Page) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    rows.into_iter().skip(offset).take(page.limit() as usize).collect()
}

/// In-memory ledger storage.
///
/// Intended for tests/dev. Committed rows sit behind an `RwLock`; a
/// transaction holds the single writer lock for its whole lifetime (which
/// also covers every row lock) and works on a private copy that replaces the
/// committed tables on `commit`.
#[derive(Debug, Clone)]
pub struct InMemoryLedgerStore {
    committed: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
    lock_timeout: Duration,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            committed: Arc::new(RwLock::new(Tables::default())),
            writer: Arc::new(Mutex::new(())),
            lock_timeout,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self
            .committed
            .read()
            .map_err(|_| StoreError::Retrieval("lock poisoned".to_string()))?;
        Ok(f(&tables))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn fetch_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        self.read(|t| t.customers.get(customer_id).cloned())
    }

    async fn fetch_items_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        self.read(|t| t.items_of(customer_id))
    }

    async fn fetch_payments_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        self.read(|t| t.payments_of(customer_id))
    }

    async fn fetch_product(&self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        self.read(|t| t.products.get(serial).cloned())
    }

    async fn fetch_products_page(&self, page: Page) -> Result<Vec<Product>, StoreError> {
        self.read(|t| page_of(t.products.values().cloned().collect(), page))
    }

    async fn fetch_customers_page(&self, page: Page) -> Result<Vec<Customer>, StoreError> {
        self.read(|t| page_of(t.customers.values().cloned().collect(), page))
    }

    async fn fetch_payments_page(&self, page: Page) -> Result<Vec<Payment>, StoreError> {
        self.read(|t| {
            let mut rows: Vec<Payment> = t.payments.values().cloned().collect();
            rows.sort_by(|a, b| {
                (&a.customer_id, a.paid_at, a.id).cmp(&(&b.customer_id, b.paid_at, b.id))
            });
            page_of(rows, page)
        })
    }

    async fn fetch_purchases_page(&self, page: Page) -> Result<Vec<Purchase>, StoreError> {
        self.read(|t| {
            let mut rows: Vec<Purchase> = t.purchases.values().cloned().collect();
            rows.sort_by(|a, b| (&a.serial, a.created_at, a.id).cmp(&(&b.serial, b.created_at, b.id)));
            page_of(rows, page)
        })
    }

    async fn fetch_customers_on_contract(&self) -> Result<Vec<Customer>, StoreError> {
        self.read(|t| {
            t.customers
                .values()
                .filter(|c| c.is_on_contract())
                .cloned()
                .collect()
        })
    }

    async fn fetch_witness(&self, customer_id: &CustomerId) -> Result<Option<Witness>, StoreError> {
        self.read(|t| t.witnesses.get(customer_id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.writer.clone().lock_owned())
            .await
            .map_err(|_| {
                StoreError::Timeout(format!(
                    "begin: writer lock not acquired within {}ms",
                    self.lock_timeout.as_millis()
                ))
            })?;
        let working = self.read(Tables::clone)?;

        Ok(Box::new(InMemoryTx {
            committed: self.committed.clone(),
            working,
            _guard: guard,
        }))
    }
}

struct InMemoryTx {
    committed: Arc<RwLock<Tables>>,
    working: Tables,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn fetch_customer_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self.working.customers.get(customer_id).cloned())
    }

    async fn fetch_product_for_update(&mut self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(serial).cloned())
    }

    async fn fetch_item(&mut self, item_id: &ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.working.items.get(item_id).cloned())
    }

    async fn fetch_items_by_customer(&mut self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        Ok(self.working.items_of(customer_id))
    }

    async fn fetch_payments_by_customer(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self.working.payments_of(customer_id))
    }

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        insert_unique(&mut self.working.customers, customer, "customer")
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        replace_existing(&mut self.working.customers, customer, "customer")
    }

    async fn update_contract_status(
        &mut self,
        customer_id: &CustomerId,
        status: ContractStatus,
    ) -> Result<(), StoreError> {
        let customer = self
            .working
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| StoreError::NotFound(format!("customer {customer_id}")))?;
        customer.status = status;
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        insert_unique(&mut self.working.products, product, "product")
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if product.units < 0 {
            return Err(StoreError::InsufficientStock {
                serial: product.serial.to_string(),
                requested: -product.units,
                available: 0,
            });
        }
        replace_existing(&mut self.working.products, product, "product")
    }

    async fn decrease_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError> {
        self.working.adjust_units(serial, StockAdjustment::decrease(qty)?)
    }

    async fn increase_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError> {
        self.working.adjust_units(serial, StockAdjustment::increase(qty)?)
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        if !self.working.customers.contains_key(&item.customer_id) {
            return Err(StoreError::NotFound(format!("customer {}", item.customer_id)));
        }
        if !self.working.products.contains_key(&item.serial) {
            return Err(StoreError::NotFound(format!("product {}", item.serial)));
        }
        insert_unique(&mut self.working.items, item, "item")
    }

    async fn update_item(&mut self, item: &Item) -> Result<(), StoreError> {
        replace_existing(&mut self.working.items, item, "item")
    }

    async fn delete_item(&mut self, item_id: &ItemId) -> Result<(), StoreError> {
        self.working
            .items
            .remove(item_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id}")))
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if !self.working.customers.contains_key(&payment.customer_id) {
            return Err(StoreError::NotFound(format!("customer {}", payment.customer_id)));
        }
        insert_unique(&mut self.working.payments, payment, "payment")
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        if !self.working.products.contains_key(&purchase.serial) {
            return Err(StoreError::NotFound(format!("product {}", purchase.serial)));
        }
        insert_unique(&mut self.working.purchases, purchase, "purchase")
    }

    async fn delete_purchase(&mut self, purchase_id: &PurchaseId) -> Result<(), StoreError> {
        self.working
            .purchases
            .remove(purchase_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("purchase {purchase_id}")))
    }

    async fn fetch_witness_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Witness>, StoreError> {
        Ok(self.working.witnesses.get(customer_id).cloned())
    }

    async fn insert_witness(&mut self, witness: &Witness) -> Result<(), StoreError> {
        if !self.working.customers.contains_key(&witness.customer_id) {
            return Err(StoreError::NotFound(format!("customer {}", witness.customer_id)));
        }
        insert_unique(&mut self.working.witnesses, witness, "witness")
    }

    async fn update_witness(&mut self, witness: &Witness) -> Result<(), StoreError> {
        replace_existing(&mut self.working.witnesses, witness, "witness")
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx {
            committed,
            working,
            _guard,
        } = *self;
        let mut tables = committed
            .write()
            .map_err(|_| StoreError::Persistence("lock poisoned".to_string()))?;
        *tables = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
