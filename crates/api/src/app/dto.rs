use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use creditshop_core::{Money, Serial};
use creditshop_customers::{ContactDetails, Customer, Payment, Witness, WitnessDetails};
use creditshop_infra::workflows::{DebtSummary, Listing, OwingCustomer, PaymentReceipt, PostedItem, RecordedPurchase};
use creditshop_products::{Product, Purchase};
use creditshop_sales::{CatalogSnapshot, Item};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Money fields accept a JSON number (`120.5`) or a decimal string (`"₵120.50"`).
pub type AmountField = Option<Value>;

#[derive(Debug, Deserialize)]
pub struct PostItemRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub serial: String,
    pub quantity: Option<u32>,
    pub deposit: AmountField,
    /// Prices the sale form was built from, keyed by serial.
    pub catalog: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectItemRequest {
    pub quantity: Option<u32>,
    pub deposit: AmountField,
    pub catalog: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub month: String,
    pub amount: AmountField,
}

#[derive(Debug, Deserialize)]
pub struct RecordPurchaseRequest {
    #[serde(default)]
    pub serial: String,
    pub quantity: Option<u32>,
    pub amount: AmountField,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: AmountField,
    #[serde(default)]
    pub units: i64,
}

/// Full replacement of a product's catalog fields.
#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: AmountField,
    #[serde(default)]
    pub units: i64,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub id_type: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub house_address: String,
    pub location: String,
    pub landmark: String,
}

impl From<ContactRequest> for ContactDetails {
    fn from(c: ContactRequest) -> Self {
        ContactDetails {
            id_type: c.id_type,
            first_name: c.first_name,
            last_name: c.last_name,
            phone: c.phone,
            house_address: c.house_address,
            location: c.location,
            landmark: c.landmark,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterCustomerRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(flatten)]
    pub contact: ContactRequest,
    #[serde(default)]
    pub agreement: String,
    #[serde(default)]
    pub months: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(flatten)]
    pub contact: ContactRequest,
    #[serde(default)]
    pub agreement: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WitnessRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub terms: String,
}

impl From<WitnessRequest> for WitnessDetails {
    fn from(w: WitnessRequest) -> Self {
        WitnessDetails {
            first_name: w.first_name,
            last_name: w.last_name,
            phone: w.phone,
            terms: w.terms,
        }
    }
}

// -------------------------
// Request mapping helpers
// -------------------------

/// Parse an optional money field; blank counts as missing.
pub fn parse_amount(field: &'static str, value: AmountField) -> Result<Option<Money>, axum::response::Response> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s,
        Some(_) => {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                format!("{field} must be a number"),
            ));
        }
    };
    Money::parse_decimal(&text)
        .map(Some)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, format!("{field}: {e}")))
}

/// Turn a submitted `{serial: price}` map into a catalog snapshot.
pub fn to_catalog(prices: BTreeMap<String, Value>) -> Result<CatalogSnapshot, axum::response::Response> {
    let mut snapshot = CatalogSnapshot::new();
    for (raw_serial, raw_price) in prices {
        let serial = Serial::parse(&raw_serial)
            .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, e.to_string()))?;
        let price = parse_amount("catalog price", Some(raw_price))?.ok_or_else(|| {
            errors::json_error(StatusCode::BAD_REQUEST, format!("catalog price for {serial} is missing"))
        })?;
        snapshot.insert(serial, price);
    }
    Ok(snapshot)
}

// -------------------------
// Response mapping helpers
// -------------------------

/// Money goes out as a decimal number rounded to 2 places.
pub fn money_json(m: Money) -> Value {
    serde_json::json!(m.to_decimal())
}

pub fn product_to_json(p: Product) -> Value {
    serde_json::json!({
        "serial": p.serial.as_str(),
        "name": p.name,
        "description": p.description,
        "price": money_json(p.price),
        "units": p.units,
        "in_stock": p.units > 0,
        "updated_at": p.updated_at.to_rfc3339(),
    })
}

pub fn customer_to_json(c: Customer) -> Value {
    serde_json::json!({
        "customer_id": c.customer_id.as_str(),
        "name": c.contact.full_name(),
        "id_type": c.contact.id_type,
        "phone": c.contact.phone,
        "house_address": c.contact.house_address,
        "location": c.contact.location,
        "landmark": c.contact.landmark,
        "agreement": c.agreement,
        "status": c.status.as_str(),
        "months_remaining": c.months_remaining,
        "created_at": c.created_at.to_rfc3339(),
    })
}

pub fn witness_to_json(w: Witness) -> Value {
    serde_json::json!({
        "customer_id": w.customer_id.as_str(),
        "first_name": w.details.first_name,
        "last_name": w.details.last_name,
        "phone": w.details.phone,
        "terms": w.details.terms,
        "has_image": w.image.is_some(),
        "updated_at": w.updated_at.to_rfc3339(),
    })
}

pub fn payment_to_json(p: Payment) -> Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "customer_id": p.customer_id.as_str(),
        "month": p.month.as_str(),
        "amount": money_json(p.amount),
        "date": p.paid_at.to_rfc3339(),
    })
}

pub fn purchase_to_json(p: Purchase) -> Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "serial": p.serial.as_str(),
        "quantity": p.quantity,
        "amount": money_json(p.amount),
        "date": p.created_at.to_rfc3339(),
    })
}

pub fn item_to_json(i: Item) -> Value {
    serde_json::json!({
        "id": i.id.to_string(),
        "customer_id": i.customer_id.as_str(),
        "serial": i.serial.as_str(),
        "price": money_json(i.price),
        "quantity": i.quantity,
        "total": money_json(i.total()),
        "deposit": money_json(i.deposit),
        "balance": money_json(i.balance),
        "date": i.created_at.to_rfc3339(),
    })
}

pub fn posted_item_to_json(p: PostedItem) -> Value {
    let mut body = item_to_json(p.item);
    body["total"] = money_json(p.total);
    body["units_remaining"] = serde_json::json!(p.units_remaining);
    body
}

pub fn receipt_to_json(r: PaymentReceipt) -> Value {
    serde_json::json!({
        "payment": payment_to_json(r.payment),
        "status": r.status.as_str(),
        "balance": money_json(r.balance),
        "months_remaining": r.months_remaining,
    })
}

pub fn recorded_purchase_to_json(r: RecordedPurchase) -> Value {
    let mut body = purchase_to_json(r.purchase);
    body["units_remaining"] = serde_json::json!(r.units_remaining);
    body
}

pub fn debt_to_json(d: &DebtSummary) -> Value {
    serde_json::json!({
        "customer_id": d.customer.customer_id.as_str(),
        "name": d.customer.contact.full_name(),
        "status": d.customer.status.as_str(),
        "months_remaining": d.customer.months_remaining,
        "charged": money_json(d.statement.charged),
        "paid": money_json(d.statement.paid),
        "debt": money_json(d.statement.balance),
        "payment": d.installment.map(money_json),
    })
}

pub fn owing_to_json(o: OwingCustomer) -> Value {
    serde_json::json!({
        "customer_id": o.customer.customer_id.as_str(),
        "name": o.customer.contact.full_name(),
        "phone": o.customer.contact.phone,
        "months_remaining": o.customer.months_remaining,
        "debt": money_json(o.balance),
        "payment": o.installment.map(money_json),
    })
}

pub fn listing_rows(listing: Listing) -> Vec<Value> {
    match listing {
        Listing::Products(rows) => rows.into_iter().map(product_to_json).collect(),
        Listing::Customers(rows) => rows.into_iter().map(customer_to_json).collect(),
        Listing::Payments(rows) => rows.into_iter().map(payment_to_json).collect(),
        Listing::Purchases(rows) => rows.into_iter().map(purchase_to_json).collect(),
    }
}
