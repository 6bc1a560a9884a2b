//! Postgres-backed ledger storage.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | any other | `Retrieval` on reads, `Persistence` on writes |
//! | RowNotFound | N/A | `NotFound` |
//! | PoolTimedOut | N/A | `Timeout` |
//! | Other | N/A | `Retrieval` on reads, `Persistence` on writes |
//!
//! Every call is additionally bounded by the configured statement timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use creditshop_core::{CustomerId, ItemId, Money, PaymentId, PurchaseId, Serial, UserId};
use creditshop_customers::{
    ContactDetails, ContractStatus, Customer, CustomerImages, MonthLabel, Payment, Witness, WitnessDetails,
};
use creditshop_products::{Product, Purchase};
use creditshop_sales::Item;

use super::{LedgerStore, LedgerTx, Page, StoreError, with_timeout};
use crate::config::DatabaseConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_ledger_schema.sql");

const CUSTOMER_COLUMNS: &str = "customer_id, id_type, first_name, last_name, phone, house_address, \
     location, landmark, agreement, contract_status, months, cust_image, card_image, user_id, \
     created_at, updated_at";

const PRODUCT_COLUMNS: &str =
    "serial, name, description, price, units, user_id, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, customer_id, serial, price, quantity, deposit, balance, user_id, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, customer_id, month, amount, user_id, paid_at";

const PURCHASE_COLUMNS: &str = "id, serial, quantity, amount, user_id, created_at";

const WITNESS_COLUMNS: &str =
    "customer_id, first_name, last_name, phone, terms, witness_image, user_id, created_at, updated_at";

/// Postgres-backed ledger store.
///
/// Uses the SQLx connection pool (thread-safe, `Send + Sync`). Row locks are
/// taken with `SELECT ... FOR UPDATE` inside a `PostgresTx`.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            timeout,
        }
    }

    /// Open a pool from configuration. Requires `database.url`.
    #[instrument(skip(config), fields(max_connections = config.max_connections), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Retrieval("database.url is not configured".to_string()))?;
        let timeout = config.statement_timeout();

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", Access::Read, e))?;

        Ok(Self::new(pool, timeout))
    }

    /// Create the ledger tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        with_timeout("ensure_schema", self.timeout, async {
            sqlx::raw_sql(SCHEMA)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", Access::Write, e))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn fetch_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        with_timeout(
            "fetch_customer",
            self.timeout,
            select_customer(&*self.pool, customer_id, false),
        )
        .await
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, item_count = tracing::field::Empty), err)]
    async fn fetch_items_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        let items = with_timeout(
            "fetch_items_by_customer",
            self.timeout,
            select_items_by_customer(&*self.pool, customer_id),
        )
        .await?;
        Span::current().record("item_count", items.len());
        Ok(items)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn fetch_payments_by_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        with_timeout(
            "fetch_payments_by_customer",
            self.timeout,
            select_payments_by_customer(&*self.pool, customer_id),
        )
        .await
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn fetch_product(&self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        with_timeout(
            "fetch_product",
            self.timeout,
            select_product(&*self.pool, serial, false),
        )
        .await
    }

    async fn fetch_products_page(&self, page: Page) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY serial ASC LIMIT $1 OFFSET $2"
        );
        with_timeout("fetch_products_page", self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(i64::from(page.limit()))
                .bind(page.offset() as i64)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("fetch_products_page", Access::Read, e))?;
            decode_rows::<ProductRow, Product>(&rows)
        })
        .await
    }

    async fn fetch_customers_page(&self, page: Page) -> Result<Vec<Customer>, StoreError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY customer_id ASC LIMIT $1 OFFSET $2"
        );
        with_timeout("fetch_customers_page", self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(i64::from(page.limit()))
                .bind(page.offset() as i64)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("fetch_customers_page", Access::Read, e))?;
            decode_rows::<CustomerRow, Customer>(&rows)
        })
        .await
    }

    async fn fetch_payments_page(&self, page: Page) -> Result<Vec<Payment>, StoreError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             ORDER BY customer_id ASC, paid_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        with_timeout("fetch_payments_page", self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(i64::from(page.limit()))
                .bind(page.offset() as i64)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("fetch_payments_page", Access::Read, e))?;
            decode_rows::<PaymentRow, Payment>(&rows)
        })
        .await
    }

    async fn fetch_purchases_page(&self, page: Page) -> Result<Vec<Purchase>, StoreError> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases \
             ORDER BY serial ASC, created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        with_timeout("fetch_purchases_page", self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(i64::from(page.limit()))
                .bind(page.offset() as i64)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("fetch_purchases_page", Access::Read, e))?;
            decode_rows::<PurchaseRow, Purchase>(&rows)
        })
        .await
    }

    async fn fetch_customers_on_contract(&self) -> Result<Vec<Customer>, StoreError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE contract_status = 'on_contract' ORDER BY customer_id ASC"
        );
        with_timeout("fetch_customers_on_contract", self.timeout, async {
            let rows = sqlx::query(&sql)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("fetch_customers_on_contract", Access::Read, e))?;
            decode_rows::<CustomerRow, Customer>(&rows)
        })
        .await
    }

    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn fetch_witness(&self, customer_id: &CustomerId) -> Result<Option<Witness>, StoreError> {
        with_timeout(
            "fetch_witness",
            self.timeout,
            select_witness(&*self.pool, customer_id, false),
        )
        .await
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = with_timeout("begin_transaction", self.timeout, async {
            self.pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin_transaction", Access::Write, e))
        })
        .await?;

        Ok(Box::new(PostgresTx {
            tx,
            timeout: self.timeout,
        }))
    }
}

/// One Postgres transaction. Dropped without `commit` → rolled back by SQLx.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    timeout: Duration,
}

#[async_trait]
impl LedgerTx for PostgresTx {
    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn fetch_customer_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        with_timeout(
            "fetch_customer_for_update",
            self.timeout,
            select_customer(&mut *self.tx, customer_id, true),
        )
        .await
    }

    async fn fetch_product_for_update(&mut self, serial: &Serial) -> Result<Option<Product>, StoreError> {
        with_timeout(
            "fetch_product_for_update",
            self.timeout,
            select_product(&mut *self.tx, serial, true),
        )
        .await
    }

    async fn fetch_item(&mut self, item_id: &ItemId) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE");
        with_timeout("fetch_item", self.timeout, async {
            let row = sqlx::query(&sql)
                .bind(*item_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("fetch_item", Access::Read, e))?;
            row.as_ref().map(decode_row::<ItemRow, Item>).transpose()
        })
        .await
    }

    async fn fetch_items_by_customer(&mut self, customer_id: &CustomerId) -> Result<Vec<Item>, StoreError> {
        with_timeout(
            "fetch_items_by_customer",
            self.timeout,
            select_items_by_customer(&mut *self.tx, customer_id),
        )
        .await
    }

    async fn fetch_payments_by_customer(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Payment>, StoreError> {
        with_timeout(
            "fetch_payments_by_customer",
            self.timeout,
            select_payments_by_customer(&mut *self.tx, customer_id),
        )
        .await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.customer_id), err)]
    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        with_timeout("insert_customer", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO customers (
                    customer_id, id_type, first_name, last_name, phone, house_address,
                    location, landmark, agreement, contract_status, months,
                    cust_image, card_image, user_id, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(customer.customer_id.as_str())
            .bind(&customer.contact.id_type)
            .bind(&customer.contact.first_name)
            .bind(&customer.contact.last_name)
            .bind(&customer.contact.phone)
            .bind(&customer.contact.house_address)
            .bind(&customer.contact.location)
            .bind(&customer.contact.landmark)
            .bind(&customer.agreement)
            .bind(customer.status.as_str())
            .bind(i64::from(customer.months_remaining))
            .bind(customer.images.photo.as_deref())
            .bind(customer.images.id_card.as_deref())
            .bind(*customer.updated_by.as_uuid())
            .bind(customer.created_at)
            .bind(customer.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("customer {} already exists", customer.customer_id))
                } else {
                    map_sqlx_error("insert_customer", Access::Write, e)
                }
            })?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.customer_id), err)]
    async fn update_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        with_timeout("update_customer", self.timeout, async {
            let result = sqlx::query(
                r#"
                UPDATE customers SET
                    id_type = $2, first_name = $3, last_name = $4, phone = $5,
                    house_address = $6, location = $7, landmark = $8, agreement = $9,
                    contract_status = $10, months = $11, cust_image = $12, card_image = $13,
                    user_id = $14, updated_at = $15
                WHERE customer_id = $1
                "#,
            )
            .bind(customer.customer_id.as_str())
            .bind(&customer.contact.id_type)
            .bind(&customer.contact.first_name)
            .bind(&customer.contact.last_name)
            .bind(&customer.contact.phone)
            .bind(&customer.contact.house_address)
            .bind(&customer.contact.location)
            .bind(&customer.contact.landmark)
            .bind(&customer.agreement)
            .bind(customer.status.as_str())
            .bind(i64::from(customer.months_remaining))
            .bind(customer.images.photo.as_deref())
            .bind(customer.images.id_card.as_deref())
            .bind(*customer.updated_by.as_uuid())
            .bind(customer.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_customer", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("customer {}", customer.customer_id))
        })
        .await
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, status = %status), err)]
    async fn update_contract_status(
        &mut self,
        customer_id: &CustomerId,
        status: ContractStatus,
    ) -> Result<(), StoreError> {
        with_timeout("update_contract_status", self.timeout, async {
            let result = sqlx::query(
                "UPDATE customers SET contract_status = $2, updated_at = NOW() WHERE customer_id = $1",
            )
            .bind(customer_id.as_str())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_contract_status", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("customer {customer_id}"))
        })
        .await
    }

    #[instrument(skip(self, product), fields(serial = %product.serial), err)]
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        with_timeout("insert_product", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO products (serial, name, description, price, units, user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(product.serial.as_str())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.minor())
            .bind(product.units)
            .bind(*product.updated_by.as_uuid())
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("product {} already exists", product.serial))
                } else {
                    map_sqlx_error("insert_product", Access::Write, e)
                }
            })?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, product), fields(serial = %product.serial, units = product.units), err)]
    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if product.units < 0 {
            return Err(StoreError::InsufficientStock {
                serial: product.serial.to_string(),
                requested: -product.units,
                available: 0,
            });
        }
        with_timeout("update_product", self.timeout, async {
            let result = sqlx::query(
                r#"
                UPDATE products SET
                    name = $2, description = $3, price = $4, units = $5, user_id = $6, updated_at = $7
                WHERE serial = $1
                "#,
            )
            .bind(product.serial.as_str())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.minor())
            .bind(product.units)
            .bind(*product.updated_by.as_uuid())
            .bind(product.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_product", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("product {}", product.serial))
        })
        .await
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn decrease_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError> {
        with_timeout("decrease_quantity", self.timeout, async {
            let row = sqlx::query(
                r#"
                UPDATE products SET units = units - $1, updated_at = NOW()
                WHERE serial = $2 AND units >= $1
                RETURNING units
                "#,
            )
            .bind(i64::from(qty))
            .bind(serial.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("decrease_quantity", Access::Write, e))?;

            if let Some(row) = row {
                return row
                    .try_get::<i64, _>("units")
                    .map_err(|e| map_sqlx_error("decrease_quantity", Access::Write, e));
            }

            // Nothing updated: tell an unknown serial apart from a short stock.
            let available: Option<i64> = sqlx::query_scalar("SELECT units FROM products WHERE serial = $1")
                .bind(serial.as_str())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("decrease_quantity", Access::Read, e))?;

            match available {
                None => Err(StoreError::NotFound(format!("product {serial}"))),
                Some(available) => Err(StoreError::InsufficientStock {
                    serial: serial.to_string(),
                    requested: i64::from(qty),
                    available,
                }),
            }
        })
        .await
    }

    #[instrument(skip(self), fields(serial = %serial), err)]
    async fn increase_quantity(&mut self, serial: &Serial, qty: u32) -> Result<i64, StoreError> {
        with_timeout("increase_quantity", self.timeout, async {
            let units: Option<i64> = sqlx::query_scalar(
                "UPDATE products SET units = units + $1, updated_at = NOW() WHERE serial = $2 RETURNING units",
            )
            .bind(i64::from(qty))
            .bind(serial.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("increase_quantity", Access::Write, e))?;

            units.ok_or_else(|| StoreError::NotFound(format!("product {serial}")))
        })
        .await
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, customer_id = %item.customer_id), err)]
    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        with_timeout("insert_item", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO items (
                    id, customer_id, serial, price, quantity, deposit, balance,
                    user_id, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(*item.id.as_uuid())
            .bind(item.customer_id.as_str())
            .bind(item.serial.as_str())
            .bind(item.price.minor())
            .bind(i64::from(item.quantity))
            .bind(item.deposit.minor())
            .bind(item.balance.minor())
            .bind(*item.recorded_by.as_uuid())
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", Access::Write, e))?;
            Ok(())
        })
        .await
    }

    async fn update_item(&mut self, item: &Item) -> Result<(), StoreError> {
        with_timeout("update_item", self.timeout, async {
            let result = sqlx::query(
                r#"
                UPDATE items SET
                    price = $2, quantity = $3, deposit = $4, balance = $5,
                    user_id = $6, updated_at = $7
                WHERE id = $1
                "#,
            )
            .bind(*item.id.as_uuid())
            .bind(item.price.minor())
            .bind(i64::from(item.quantity))
            .bind(item.deposit.minor())
            .bind(item.balance.minor())
            .bind(*item.recorded_by.as_uuid())
            .bind(item.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_item", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("item {}", item.id))
        })
        .await
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn delete_item(&mut self, item_id: &ItemId) -> Result<(), StoreError> {
        with_timeout("delete_item", self.timeout, async {
            let result = sqlx::query("DELETE FROM items WHERE id = $1")
                .bind(*item_id.as_uuid())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("delete_item", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("item {item_id}"))
        })
        .await
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id, customer_id = %payment.customer_id), err)]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        with_timeout("insert_payment", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO payments (id, customer_id, month, amount, user_id, paid_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(*payment.id.as_uuid())
            .bind(payment.customer_id.as_str())
            .bind(payment.month.as_str())
            .bind(payment.amount.minor())
            .bind(*payment.recorded_by.as_uuid())
            .bind(payment.paid_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", Access::Write, e))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, purchase), fields(purchase_id = %purchase.id, serial = %purchase.serial), err)]
    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        with_timeout("insert_purchase", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO purchases (id, serial, quantity, amount, user_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(*purchase.id.as_uuid())
            .bind(purchase.serial.as_str())
            .bind(i64::from(purchase.quantity))
            .bind(purchase.amount.minor())
            .bind(*purchase.recorded_by.as_uuid())
            .bind(purchase.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_purchase", Access::Write, e))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(purchase_id = %purchase_id), err)]
    async fn delete_purchase(&mut self, purchase_id: &PurchaseId) -> Result<(), StoreError> {
        with_timeout("delete_purchase", self.timeout, async {
            let result = sqlx::query("DELETE FROM purchases WHERE id = $1")
                .bind(*purchase_id.as_uuid())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("delete_purchase", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("purchase {purchase_id}"))
        })
        .await
    }

    async fn fetch_witness_for_update(
        &mut self,
        customer_id: &CustomerId,
    ) -> Result<Option<Witness>, StoreError> {
        with_timeout(
            "fetch_witness_for_update",
            self.timeout,
            select_witness(&mut *self.tx, customer_id, true),
        )
        .await
    }

    #[instrument(skip(self, witness), fields(customer_id = %witness.customer_id), err)]
    async fn insert_witness(&mut self, witness: &Witness) -> Result<(), StoreError> {
        with_timeout("insert_witness", self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO witnesses (customer_id, first_name, last_name, phone, terms, witness_image,
                                       user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(witness.customer_id.as_str())
            .bind(&witness.details.first_name)
            .bind(&witness.details.last_name)
            .bind(&witness.details.phone)
            .bind(&witness.details.terms)
            .bind(witness.image.as_deref())
            .bind(*witness.recorded_by.as_uuid())
            .bind(witness.created_at)
            .bind(witness.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("customer {} already has a witness", witness.customer_id))
                } else {
                    map_sqlx_error("insert_witness", Access::Write, e)
                }
            })?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, witness), fields(customer_id = %witness.customer_id), err)]
    async fn update_witness(&mut self, witness: &Witness) -> Result<(), StoreError> {
        with_timeout("update_witness", self.timeout, async {
            let result = sqlx::query(
                r#"
                UPDATE witnesses SET
                    first_name = $2, last_name = $3, phone = $4, terms = $5, witness_image = $6,
                    user_id = $7, updated_at = $8
                WHERE customer_id = $1
                "#,
            )
            .bind(witness.customer_id.as_str())
            .bind(&witness.details.first_name)
            .bind(&witness.details.last_name)
            .bind(&witness.details.phone)
            .bind(&witness.details.terms)
            .bind(witness.image.as_deref())
            .bind(*witness.recorded_by.as_uuid())
            .bind(witness.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_witness", Access::Write, e))?;
            expect_one_row(result.rows_affected(), || format!("witness of customer {}", witness.customer_id))
        })
        .await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PostgresTx { tx, timeout } = *self;
        with_timeout("commit_transaction", timeout, async {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", Access::Write, e))
        })
        .await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PostgresTx { tx, timeout } = *self;
        with_timeout("rollback", timeout, async {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", Access::Write, e))
        })
        .await
    }
}

async fn select_customer<'e, E>(
    executor: E,
    customer_id: &CustomerId,
    for_update: bool,
) -> Result<Option<Customer>, StoreError>
where
    E: PgExecutor<'e>,
{
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE customer_id = $1{lock}");
    let row = sqlx::query(&sql)
        .bind(customer_id.as_str())
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error("fetch_customer", Access::Read, e))?;
    row.as_ref().map(decode_row::<CustomerRow, Customer>).transpose()
}

async fn select_product<'e, E>(
    executor: E,
    serial: &Serial,
    for_update: bool,
) -> Result<Option<Product>, StoreError>
where
    E: PgExecutor<'e>,
{
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE serial = $1{lock}");
    let row = sqlx::query(&sql)
        .bind(serial.as_str())
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error("fetch_product", Access::Read, e))?;
    row.as_ref().map(decode_row::<ProductRow, Product>).transpose()
}

async fn select_witness<'e, E>(
    executor: E,
    customer_id: &CustomerId,
    for_update: bool,
) -> Result<Option<Witness>, StoreError>
where
    E: PgExecutor<'e>,
{
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {WITNESS_COLUMNS} FROM witnesses WHERE customer_id = $1{lock}");
    let row = sqlx::query(&sql)
        .bind(customer_id.as_str())
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error("fetch_witness", Access::Read, e))?;
    row.as_ref().map(decode_row::<WitnessRow, Witness>).transpose()
}

async fn select_items_by_customer<'e, E>(
    executor: E,
    customer_id: &CustomerId,
) -> Result<Vec<Item>, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE customer_id = $1 ORDER BY created_at ASC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(customer_id.as_str())
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error("fetch_items_by_customer", Access::Read, e))?;
    decode_rows::<ItemRow, Item>(&rows)
}

async fn select_payments_by_customer<'e, E>(
    executor: E,
    customer_id: &CustomerId,
) -> Result<Vec<Payment>, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = $1 ORDER BY paid_at ASC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(customer_id.as_str())
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error("fetch_payments_by_customer", Access::Read, e))?;
    decode_rows::<PaymentRow, Payment>(&rows)
}

fn expect_one_row(affected: u64, what: impl FnOnce() -> String) -> Result<(), StoreError> {
    if affected == 0 {
        return Err(StoreError::NotFound(what()));
    }
    Ok(())
}

/// Whether a failed statement was reading or writing; decides the fallback error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, access: Access, err: sqlx::Error) -> StoreError {
    let fallback = |msg: String| match access {
        Access::Read => StoreError::Retrieval(msg),
        Access::Write => StoreError::Persistence(msg),
    };

    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => fallback(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("no row in {operation}")),
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => fallback(format!("connection pool closed in {operation}")),
        other => fallback(format!("sqlx error in {operation}: {other}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn decode_row<R, T>(row: &PgRow) -> Result<T, StoreError>
where
    R: for<'r> FromRow<'r, PgRow>,
    T: TryFrom<R, Error = StoreError>,
{
    let raw = R::from_row(row).map_err(|e| StoreError::Retrieval(format!("failed to decode row: {e}")))?;
    T::try_from(raw)
}

fn decode_rows<R, T>(rows: &[PgRow]) -> Result<Vec<T>, StoreError>
where
    R: for<'r> FromRow<'r, PgRow>,
    T: TryFrom<R, Error = StoreError>,
{
    rows.iter().map(decode_row::<R, T>).collect()
}

fn corrupt(what: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Retrieval(format!("invalid {what} in stored row: {err}"))
}

fn count_from(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|e| corrupt(column, e))
}

// SQLx row types

#[derive(Debug)]
struct CustomerRow {
    customer_id: String,
    id_type: String,
    first_name: String,
    last_name: String,
    phone: String,
    house_address: String,
    location: String,
    landmark: String,
    agreement: String,
    contract_status: String,
    months: i64,
    cust_image: Option<Vec<u8>>,
    card_image: Option<Vec<u8>>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for CustomerRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CustomerRow {
            customer_id: row.try_get("customer_id")?,
            id_type: row.try_get("id_type")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            phone: row.try_get("phone")?,
            house_address: row.try_get("house_address")?,
            location: row.try_get("location")?,
            landmark: row.try_get("landmark")?,
            agreement: row.try_get("agreement")?,
            contract_status: row.try_get("contract_status")?,
            months: row.try_get("months")?,
            cust_image: row.try_get("cust_image")?,
            card_image: row.try_get("card_image")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            customer_id: CustomerId::parse(&row.customer_id).map_err(|e| corrupt("customer_id", e))?,
            contact: ContactDetails {
                id_type: row.id_type,
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                house_address: row.house_address,
                location: row.location,
                landmark: row.landmark,
            },
            agreement: row.agreement,
            status: row
                .contract_status
                .parse()
                .map_err(|e| corrupt("contract_status", e))?,
            months_remaining: count_from("months", row.months)?,
            images: CustomerImages {
                photo: row.cust_image,
                id_card: row.card_image,
            },
            updated_by: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct ProductRow {
    serial: String,
    name: String,
    description: String,
    price: i64,
    units: i64,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            serial: row.try_get("serial")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            units: row.try_get("units")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            serial: Serial::parse(&row.serial).map_err(|e| corrupt("serial", e))?,
            name: row.name,
            description: row.description,
            price: Money::from_minor(row.price),
            units: row.units,
            updated_by: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct ItemRow {
    id: Uuid,
    customer_id: String,
    serial: String,
    price: i64,
    quantity: i64,
    deposit: i64,
    balance: i64,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            serial: row.try_get("serial")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
            deposit: row.try_get("deposit")?,
            balance: row.try_get("balance")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            id: ItemId::from_uuid(row.id),
            customer_id: CustomerId::parse(&row.customer_id).map_err(|e| corrupt("customer_id", e))?,
            serial: Serial::parse(&row.serial).map_err(|e| corrupt("serial", e))?,
            price: Money::from_minor(row.price),
            quantity: count_from("quantity", row.quantity)?,
            deposit: Money::from_minor(row.deposit),
            balance: Money::from_minor(row.balance),
            recorded_by: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct PaymentRow {
    id: Uuid,
    customer_id: String,
    month: String,
    amount: i64,
    user_id: Uuid,
    paid_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PaymentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PaymentRow {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            month: row.try_get("month")?,
            amount: row.try_get("amount")?,
            user_id: row.try_get("user_id")?,
            paid_at: row.try_get("paid_at")?,
        })
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            customer_id: CustomerId::parse(&row.customer_id).map_err(|e| corrupt("customer_id", e))?,
            month: MonthLabel::parse(&row.month).map_err(|e| corrupt("month", e))?,
            amount: Money::from_minor(row.amount),
            recorded_by: UserId::from_uuid(row.user_id),
            paid_at: row.paid_at,
        })
    }
}

#[derive(Debug)]
struct PurchaseRow {
    id: Uuid,
    serial: String,
    quantity: i64,
    amount: i64,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PurchaseRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PurchaseRow {
            id: row.try_get("id")?,
            serial: row.try_get("serial")?,
            quantity: row.try_get("quantity")?,
            amount: row.try_get("amount")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = StoreError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        Ok(Purchase {
            id: PurchaseId::from_uuid(row.id),
            serial: Serial::parse(&row.serial).map_err(|e| corrupt("serial", e))?,
            quantity: count_from("quantity", row.quantity)?,
            amount: Money::from_minor(row.amount),
            recorded_by: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct WitnessRow {
    customer_id: String,
    first_name: String,
    last_name: String,
    phone: String,
    terms: String,
    witness_image: Option<Vec<u8>>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for WitnessRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(WitnessRow {
            customer_id: row.try_get("customer_id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            phone: row.try_get("phone")?,
            terms: row.try_get("terms")?,
            witness_image: row.try_get("witness_image")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<WitnessRow> for Witness {
    type Error = StoreError;

    fn try_from(row: WitnessRow) -> Result<Self, Self::Error> {
        Ok(Witness {
            customer_id: CustomerId::parse(&row.customer_id).map_err(|e| corrupt("customer_id", e))?,
            details: WitnessDetails {
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                terms: row.terms,
            },
            image: row.witness_image,
            recorded_by: UserId::from_uuid(row.user_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_follow_access_kind() {
        assert!(matches!(
            map_sqlx_error("fetch_product", Access::Read, sqlx::Error::PoolClosed),
            StoreError::Retrieval(_)
        ));
        assert!(matches!(
            map_sqlx_error("insert_item", Access::Write, sqlx::Error::PoolClosed),
            StoreError::Persistence(_)
        ));
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            map_sqlx_error("begin_transaction", Access::Write, sqlx::Error::PoolTimedOut),
            StoreError::Timeout(_)
        ));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error("fetch_item", Access::Read, sqlx::Error::RowNotFound),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn corrupt_rows_surface_as_retrieval_errors() {
        let row = PaymentRow {
            id: Uuid::now_v7(),
            customer_id: "C001".to_string(),
            month: "The Month".to_string(),
            amount: 100,
            user_id: Uuid::now_v7(),
            paid_at: Utc::now(),
        };
        assert!(matches!(Payment::try_from(row), Err(StoreError::Retrieval(_))));

        let row = WitnessRow {
            customer_id: "  ".to_string(),
            first_name: "Efua".to_string(),
            last_name: "Asante".to_string(),
            phone: "0277000000".to_string(),
            terms: "guarantor".to_string(),
            witness_image: None,
            user_id: Uuid::now_v7(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(Witness::try_from(row), Err(StoreError::Retrieval(_))));
    }

    /// Runs only when `DATABASE_URL` points at a disposable Postgres database.
    #[tokio::test]
    async fn guarded_decrease_against_postgres() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let config = DatabaseConfig {
            url: Some(url),
            ..DatabaseConfig::default()
        };
        let store = PostgresLedgerStore::connect(&config).await.unwrap();
        store.ensure_schema().await.unwrap();

        let serial = Serial::parse(&format!("PGTEST-{}", Uuid::now_v7())).unwrap();
        let product = Product {
            serial: serial.clone(),
            name: "Test fan".to_string(),
            description: String::new(),
            price: Money::from_minor(1_000),
            units: 3,
            updated_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.decrease_quantity(&serial, 5).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { available: 3, .. }));
        assert_eq!(tx.decrease_quantity(&serial, 2).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        assert_eq!(store.fetch_product(&serial).await.unwrap().unwrap().units, 3);

        let mut edited = product.clone();
        edited.units = -2;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.update_product(&edited).await,
            Err(StoreError::InsufficientStock { .. })
        ));
        edited.units = 0;
        edited.price = Money::from_minor(1_500);
        tx.update_product(&edited).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.fetch_product(&serial).await.unwrap().unwrap();
        assert_eq!((stored.price, stored.units), (Money::from_minor(1_500), 0));
    }
}
