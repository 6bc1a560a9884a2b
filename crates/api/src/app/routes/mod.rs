use axum::{
    Router,
    routing::{get, post, put},
};

pub mod customers;
pub mod ledger;
pub mod listings;
pub mod payments;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod system;

/// Read-only endpoints. No actor required.
pub fn read_router() -> Router {
    Router::new()
        .route("/api/customer-debt/:id", post(ledger::customer_debt))
        .route("/api/owing-today", get(ledger::owing_today))
        .route("/api/list-products/:page", get(listings::list_products))
        .route("/api/list-customers/:page", get(listings::list_customers))
        .route("/api/list-payments/:page", get(listings::list_payments))
        .route("/api/list-purchases/:page", get(listings::list_purchases))
        .route("/api/customers/:id/witness", get(customers::witness))
}

/// Endpoints that write. Wrapped in the actor middleware by the caller.
pub fn write_router() -> Router {
    Router::new()
        .route("/api/items", post(sales::post_item))
        .route("/api/items/:id", put(sales::correct_item))
        .route("/api/payments", post(payments::record_payment))
        .route("/api/purchases", post(purchases::record_purchase))
        .route("/api/products", post(products::register_product))
        .route("/api/products/:serial", put(products::update_product))
        .route("/api/products/:serial/restock", post(products::restock))
        .route("/api/customers", post(customers::register_customer))
        .route("/api/customers/:id", put(customers::update_profile))
        .route(
            "/api/customers/:id/witness",
            post(customers::add_witness).put(customers::update_witness),
        )
}
