//! Single-table maintenance: registering and editing products and customers,
//! recording contract witnesses, correcting mis-keyed sales.

use chrono::Utc;
use tracing::{info, instrument};

use creditshop_core::{CustomerId, ItemId, Money, Serial, UserId};
use creditshop_customers::{
    ContactDetails, Customer, CustomerImages, RecordWitness, RegisterCustomer, UpdateProfile,
    UpdateWitness, Witness, WitnessDetails,
};
use creditshop_products::{Product, RegisterProduct, UpdateProduct};
use creditshop_sales::{CatalogSnapshot, CorrectItem, Item};

use super::{WorkflowError, finish, write_failure};
use crate::store::LedgerStore;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub serial: String,
    pub name: String,
    pub description: String,
    pub price: Option<Money>,
    pub units: i64,
    pub actor: UserId,
}

/// Catalog edit. Every field replaces the stored one.
#[derive(Debug, Clone)]
pub struct ProductEdit {
    pub serial: String,
    pub name: String,
    pub description: String,
    pub price: Option<Money>,
    pub units: i64,
    pub actor: UserId,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub customer_id: String,
    pub contact: ContactDetails,
    pub agreement: String,
    /// Contract length in months.
    pub months: u32,
    pub images: CustomerImages,
    pub actor: UserId,
}

/// Profile edit. `None` images keep the stored ones.
#[derive(Debug, Clone)]
pub struct ProfileEdit {
    pub customer_id: String,
    pub contact: ContactDetails,
    pub agreement: String,
    pub photo: Option<Vec<u8>>,
    pub id_card: Option<Vec<u8>>,
    pub actor: UserId,
}

/// Witness form. Used for both recording and editing; on edit a `None`
/// image keeps the stored one.
#[derive(Debug, Clone)]
pub struct WitnessForm {
    pub customer_id: String,
    pub details: WitnessDetails,
    pub image: Option<Vec<u8>>,
    pub actor: UserId,
}

#[derive(Debug, Clone)]
pub struct CorrectItemRequest {
    pub item_id: String,
    pub quantity: u32,
    pub deposit: Option<Money>,
    pub actor: UserId,
}

#[derive(Debug, Clone)]
pub struct Registry<S> {
    store: S,
}

impl<S: LedgerStore> Registry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Duplicate serials are rejected with `Conflict`.
    #[instrument(skip(self, req), fields(serial = %req.serial, actor = %req.actor), err)]
    pub async fn register_product(&self, req: NewProduct) -> Result<Product, WorkflowError> {
        let price = req
            .price
            .ok_or_else(|| WorkflowError::validation("price is required"))?;
        let product = Product::register(RegisterProduct {
            serial: Serial::parse(&req.serial)?,
            name: req.name,
            description: req.description,
            price,
            units: req.units,
            actor: req.actor,
            occurred_at: Utc::now(),
        })?;

        let mut tx = self.store.begin().await?;
        let result: Result<(), WorkflowError> = async {
            if tx.fetch_product_for_update(&product.serial).await?.is_some() {
                return Err(WorkflowError::conflict(format!(
                    "product with serial {} already exists",
                    product.serial
                )));
            }
            tx.insert_product(&product).await.map_err(write_failure)
        }
        .await;
        finish(tx, result).await?;

        info!(units = product.units, "product registered");
        Ok(product)
    }

    /// Replace a product's catalog fields under its row lock.
    ///
    /// Unknown serial → `NotFound`; negative units or price → `Validation`.
    #[instrument(skip(self, req), fields(serial = %req.serial, actor = %req.actor), err)]
    pub async fn update_product(&self, req: ProductEdit) -> Result<Product, WorkflowError> {
        let serial = Serial::parse(&req.serial)?;
        let price = req
            .price
            .ok_or_else(|| WorkflowError::validation("price is required"))?;
        let edit = UpdateProduct {
            name: req.name,
            description: req.description,
            price,
            units: req.units,
            actor: req.actor,
            occurred_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        let result: Result<Product, WorkflowError> = async {
            let mut product = tx
                .fetch_product_for_update(&serial)
                .await?
                .ok_or_else(|| WorkflowError::not_found(format!("product {serial} not found")))?;
            product.update(edit)?;
            tx.update_product(&product).await.map_err(write_failure)?;
            Ok(product)
        }
        .await;
        let product = finish(tx, result).await?;

        info!(price = %product.price, units = product.units, "product updated");
        Ok(product)
    }

    /// Open a new contract. Duplicate customer ids are rejected with `Conflict`.
    #[instrument(skip(self, req), fields(customer_id = %req.customer_id, actor = %req.actor), err)]
    pub async fn register_customer(&self, req: NewCustomer) -> Result<Customer, WorkflowError> {
        let customer = Customer::register(RegisterCustomer {
            customer_id: CustomerId::parse(&req.customer_id)?,
            contact: req.contact,
            agreement: req.agreement,
            months: req.months,
            images: req.images,
            actor: req.actor,
            occurred_at: Utc::now(),
        })?;

        let mut tx = self.store.begin().await?;
        let result: Result<(), WorkflowError> = async {
            if tx.fetch_customer_for_update(&customer.customer_id).await?.is_some() {
                return Err(WorkflowError::conflict(format!(
                    "customer with id {} already exists",
                    customer.customer_id
                )));
            }
            tx.insert_customer(&customer).await.map_err(write_failure)
        }
        .await;
        finish(tx, result).await?;

        info!(months = customer.months_remaining, "customer registered");
        Ok(customer)
    }

    /// Replace contact details and, when given, images. Contract status and
    /// remaining months are left alone.
    #[instrument(skip(self, req), fields(customer_id = %req.customer_id, actor = %req.actor), err)]
    pub async fn update_customer_profile(&self, req: ProfileEdit) -> Result<Customer, WorkflowError> {
        let customer_id = CustomerId::parse(&req.customer_id)?;
        let edit = UpdateProfile {
            contact: req.contact,
            agreement: req.agreement,
            photo: req.photo,
            id_card: req.id_card,
            actor: req.actor,
            occurred_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        let result: Result<Customer, WorkflowError> = async {
            let mut customer = tx
                .fetch_customer_for_update(&customer_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found(format!("customer {customer_id} not found")))?;
            customer.update_profile(edit)?;
            tx.update_customer(&customer).await.map_err(write_failure)?;
            Ok(customer)
        }
        .await;
        finish(tx, result).await
    }

    /// Record the witness of a contract. The customer must exist and may have
    /// only one witness: a second one is `Conflict`.
    #[instrument(skip(self, req), fields(customer_id = %req.customer_id, actor = %req.actor), err)]
    pub async fn add_witness(&self, req: WitnessForm) -> Result<Witness, WorkflowError> {
        let witness = Witness::record(RecordWitness {
            customer_id: CustomerId::parse(&req.customer_id)?,
            details: req.details,
            image: req.image,
            actor: req.actor,
            occurred_at: Utc::now(),
        })?;
        let customer_id = &witness.customer_id;

        let mut tx = self.store.begin().await?;
        let result: Result<(), WorkflowError> = async {
            if tx.fetch_customer_for_update(customer_id).await?.is_none() {
                return Err(WorkflowError::not_found(format!("customer {customer_id} not found")));
            }
            if tx.fetch_witness_for_update(customer_id).await?.is_some() {
                return Err(WorkflowError::conflict(format!(
                    "customer {customer_id} already has a witness"
                )));
            }
            tx.insert_witness(&witness).await.map_err(write_failure)
        }
        .await;
        finish(tx, result).await?;

        info!("witness recorded");
        Ok(witness)
    }

    #[instrument(skip(self, req), fields(customer_id = %req.customer_id, actor = %req.actor), err)]
    pub async fn update_witness(&self, req: WitnessForm) -> Result<Witness, WorkflowError> {
        let customer_id = CustomerId::parse(&req.customer_id)?;
        let edit = UpdateWitness {
            details: req.details,
            image: req.image,
            actor: req.actor,
            occurred_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        let result: Result<Witness, WorkflowError> = async {
            let mut witness = tx
                .fetch_witness_for_update(&customer_id)
                .await?
                .ok_or_else(|| {
                    WorkflowError::not_found(format!("no witness recorded for customer {customer_id}"))
                })?;
            witness.update(edit)?;
            tx.update_witness(&witness).await.map_err(write_failure)?;
            Ok(witness)
        }
        .await;
        finish(tx, result).await
    }

    pub async fn witness(&self, customer_id: &str) -> Result<Witness, WorkflowError> {
        let customer_id = CustomerId::parse(customer_id)?;
        self.store
            .fetch_witness(&customer_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("no witness recorded for customer {customer_id}")))
    }

    /// Re-price a sale from `catalog` and recompute its balance.
    ///
    /// Stock is not re-adjusted.
    #[instrument(skip(self, req, catalog), fields(item_id = %req.item_id, actor = %req.actor), err)]
    pub async fn correct_item(
        &self,
        req: CorrectItemRequest,
        catalog: &CatalogSnapshot,
    ) -> Result<Item, WorkflowError> {
        let item_id: ItemId = req.item_id.trim().parse()?;
        if req.quantity == 0 {
            return Err(WorkflowError::validation("quantity is required"));
        }
        let deposit = req
            .deposit
            .ok_or_else(|| WorkflowError::validation("deposit amount is required"))?;

        let mut tx = self.store.begin().await?;
        let result: Result<Item, WorkflowError> = async {
            let mut item = tx
                .fetch_item(&item_id)
                .await?
                .ok_or_else(|| WorkflowError::not_found(format!("item {item_id} not found")))?;
            let unit_price = catalog.price_of(&item.serial)?;
            item.correct(CorrectItem {
                unit_price,
                quantity: req.quantity,
                deposit,
                actor: req.actor,
                occurred_at: Utc::now(),
            })?;
            tx.update_item(&item).await.map_err(write_failure)?;
            Ok(item)
        }
        .await;
        let item = finish(tx, result).await?;

        info!(balance = %item.balance, "item corrected");
        Ok(item)
    }
}
