use std::sync::Arc;

use anyhow::Context;

use creditshop_core::{ItemId, Serial};
use creditshop_infra::config::DatabaseConfig;
use creditshop_infra::store::{InMemoryLedgerStore, PostgresLedgerStore};
use creditshop_infra::workflows::{
    InventoryAdjuster, ItemIntake, LedgerCalculator, ListingRepository, PaymentProcessor,
    PurchaseRecorder, Registry,
};
use creditshop_infra::{LedgerStore, WorkflowError};
use creditshop_sales::CatalogSnapshot;

/// Shared handle the routes build their workflows from.
///
/// The store is the only state; workflows are cheap to construct per request.
#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn LedgerStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()))
    }

    pub fn store(&self) -> Arc<dyn LedgerStore> {
        self.store.clone()
    }

    pub fn calculator(&self) -> LedgerCalculator<Arc<dyn LedgerStore>> {
        LedgerCalculator::new(self.store())
    }

    pub fn inventory(&self) -> InventoryAdjuster<Arc<dyn LedgerStore>> {
        InventoryAdjuster::new(self.store())
    }

    pub fn intake(&self) -> ItemIntake<Arc<dyn LedgerStore>> {
        ItemIntake::new(self.store())
    }

    pub fn payments(&self) -> PaymentProcessor<Arc<dyn LedgerStore>> {
        PaymentProcessor::new(self.store())
    }

    pub fn purchases(&self) -> PurchaseRecorder<Arc<dyn LedgerStore>> {
        PurchaseRecorder::new(self.store())
    }

    pub fn listings(&self) -> ListingRepository<Arc<dyn LedgerStore>> {
        ListingRepository::new(self.store())
    }

    pub fn registry(&self) -> Registry<Arc<dyn LedgerStore>> {
        Registry::new(self.store())
    }

    /// Snapshot of the current prices of `serials`, for requests that did not
    /// carry the catalog their form was built from. Unknown serials are left
    /// out and surface later as `NotFound`.
    pub async fn current_catalog(&self, serials: &[&str]) -> Result<CatalogSnapshot, WorkflowError> {
        let mut products = Vec::with_capacity(serials.len());
        for raw in serials {
            let Ok(serial) = Serial::parse(raw) else {
                continue;
            };
            if let Some(product) = self.store.fetch_product(&serial).await? {
                products.push(product);
            }
        }
        Ok(CatalogSnapshot::from_products(&products))
    }

    /// Serial of a stored sale, read in a throwaway transaction.
    pub async fn item_serial(&self, item_id: &ItemId) -> Result<Option<String>, WorkflowError> {
        let mut tx = self.store.begin().await?;
        let found = tx.fetch_item(item_id).await;
        tx.rollback().await?;
        Ok(found?.map(|item| item.serial.as_str().to_string()))
    }
}

/// Pick the store from configuration: Postgres when `database.url` is set,
/// in-memory otherwise. Either way `database.statement_timeout_ms` bounds how
/// long a write waits for its locks.
pub async fn build_services(config: &DatabaseConfig) -> anyhow::Result<AppServices> {
    if config.url.is_none() {
        tracing::warn!("database.url not set; using in-memory store");
        let store = InMemoryLedgerStore::with_lock_timeout(config.statement_timeout());
        return Ok(AppServices::new(Arc::new(store)));
    }

    let store = PostgresLedgerStore::connect(config)
        .await
        .context("failed to connect to Postgres")?;
    store
        .ensure_schema()
        .await
        .context("failed to apply ledger schema")?;
    tracing::info!("using Postgres ledger store");

    Ok(AppServices::new(Arc::new(store)))
}
