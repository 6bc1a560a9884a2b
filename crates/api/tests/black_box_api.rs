use std::sync::Arc;

use creditshop_api::app::{AppServices, router};
use creditshop_core::UserId;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    actor: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over an in-memory store, on an ephemeral port.
        let app = router(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            actor: UserId::new().to_string(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .header("x-user-id", &self.actor)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .put(self.url(path))
            .header("x-user-id", &self.actor)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn seed_product(&self, serial: &str, price: &str, units: i64) {
        let (status, _) = self
            .post(
                "/api/products",
                json!({ "serial": serial, "name": "Fridge", "description": "two door", "price": price, "units": units }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn seed_customer(&self, id: &str, months: u32) {
        let (status, body) = self
            .post(
                "/api/customers",
                json!({
                    "customer_id": id,
                    "first_name": "Ama",
                    "last_name": "Mensah",
                    "phone": "0244000000",
                    "agreement": "monthly installments",
                    "months": months,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn writes_require_an_actor() {
    let server = TestServer::spawn().await;

    let res = server
        .client
        .post(server.url("/api/products"))
        .json(&json!({ "serial": "P1", "price": "10.00", "units": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], true);

    let res = server
        .client
        .post(server.url("/api/products"))
        .header("x-user-id", "nobody")
        .json(&json!({ "serial": "P1", "price": "10.00", "units": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Reads stay open.
    let (status, _) = server.get("/api/list-products/1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn credit_sale_is_paid_off_and_contract_closes() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "200.00", 3).await;
    server.seed_customer("C001", 3).await;

    let (status, body) = server
        .post(
            "/api/items",
            json!({ "customer_id": "C001", "serial": "P1", "quantity": 1, "deposit": "0" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["item"]["balance"], json!(200.0));
    assert_eq!(body["item"]["units_remaining"], json!(2));

    let (status, debt) = server.post("/api/customer-debt/C001", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(debt["error"], false);
    assert_eq!(debt["debt"], json!(200.0));
    assert_eq!(debt["payment"], json!(66.67));

    let (status, body) = server
        .post(
            "/api/payments",
            json!({ "customer_id": "C001", "month": "March", "amount": 200 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["receipt"]["status"], "off_contract");
    assert_eq!(body["receipt"]["balance"], json!(0.0));

    let (status, debt) = server.post("/api/customer-debt/C001", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(debt["status"], "off_contract");
    assert_eq!(debt["error"], true);
    assert_eq!(debt["message"], "Customer is fully paid");

    let (_, page) = server.get("/api/list-payments/1").await;
    assert_eq!(page["payments"].as_array().map(Vec::len), Some(1));
    let (_, past_end) = server.get("/api/list-payments/2").await;
    assert_eq!(past_end["message"], "no more data");
}

#[tokio::test]
async fn overselling_is_rejected_and_nothing_is_recorded() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "50.00", 1).await;
    server.seed_customer("C001", 2).await;

    let (status, body) = server
        .post(
            "/api/items",
            json!({ "customer_id": "C001", "serial": "P1", "quantity": 2, "deposit": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], true);

    let (_, debt) = server.post("/api/customer-debt/C001", json!({})).await;
    assert_eq!(debt["debt"], json!(0.0));

    let (_, products) = server.get("/api/list-products/1").await;
    assert_eq!(products["products"][0]["units"], json!(1));
}

#[tokio::test]
async fn submitted_catalog_prices_the_sale() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "200.00", 3).await;
    server.seed_customer("C001", 4).await;

    let (status, body) = server
        .post(
            "/api/items",
            json!({
                "customer_id": "C001",
                "serial": "P1",
                "quantity": 2,
                "deposit": "30.00",
                "catalog": { "P1": "150.00" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["item"]["total"], json!(300.0));
    assert_eq!(body["item"]["balance"], json!(270.0));
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "20.00", 3).await;
    server.seed_customer("C001", 2).await;

    let (status, _) = server
        .post("/api/items", json!({ "customer_id": "C001", "serial": "P1", "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .post(
            "/api/payments",
            json!({ "customer_id": "C001", "month": "The Month", "amount": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);

    let (status, _) = server.post("/api/customer-debt/C404", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "20.00", 3).await;

    let (status, _) = server
        .post("/api/products", json!({ "serial": "P1", "price": "25.00", "units": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cash_purchase_and_restock_move_stock() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "20.00", 2).await;

    let (status, body) = server
        .post("/api/purchases", json!({ "serial": "P1", "quantity": 2, "amount": "40.00" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["purchase"]["units_remaining"], json!(0));

    let (status, body) = server
        .post("/api/products/P1/restock", json!({ "quantity": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["units"], json!(5));
}

#[tokio::test]
async fn customer_signed_today_owes_today() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "90.00", 1).await;
    server.seed_customer("C001", 3).await;
    let (status, _) = server
        .post(
            "/api/items",
            json!({ "customer_id": "C001", "serial": "P1", "quantity": 1, "deposit": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = server.get("/api/owing-today").await;
    assert_eq!(status, StatusCode::OK);
    let customers = body["customers"].as_array().cloned().unwrap_or_default();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0]["customer_id"], "C001");
    assert_eq!(customers[0]["payment"], json!(30.0));
}

#[tokio::test]
async fn product_edit_reprices_later_sales_only() {
    let server = TestServer::spawn().await;
    server.seed_product("P1", "200.00", 3).await;
    server.seed_customer("C001", 2).await;

    let (status, _) = server
        .post(
            "/api/items",
            json!({ "customer_id": "C001", "serial": "P1", "quantity": 1, "deposit": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = server
        .put(
            "/api/products/P1",
            json!({ "name": "Fridge", "description": "two door", "price": "250.00", "units": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["product"]["price"], json!(250.0));
    assert_eq!(body["product"]["units"], json!(4));

    let (status, body) = server
        .post(
            "/api/items",
            json!({ "customer_id": "C001", "serial": "P1", "quantity": 1, "deposit": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["item"]["balance"], json!(250.0));
    assert_eq!(body["item"]["units_remaining"], json!(3));

    let (_, debt) = server.post("/api/customer-debt/C001", json!({})).await;
    assert_eq!(debt["debt"], json!(450.0));

    let (status, _) = server
        .put("/api/products/P1", json!({ "name": "Fridge", "price": "250.00", "units": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server
        .put("/api/products/P404", json!({ "name": "Fan", "price": "10.00", "units": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn witness_is_recorded_once_and_can_be_edited() {
    let server = TestServer::spawn().await;
    server.seed_customer("C001", 6).await;
    let witness = json!({
        "first_name": "Yaw",
        "last_name": "Darko",
        "phone": "0244123456",
        "terms": "settles arrears on default",
    });

    let (status, body) = server.post("/api/customers/C001/witness", witness.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, _) = server.post("/api/customers/C001/witness", witness).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server
        .put(
            "/api/customers/C001/witness",
            json!({ "first_name": "Yaw", "last_name": "Darko", "phone": "0200000000", "terms": "guarantor" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = server.get("/api/customers/C001/witness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["witness"]["phone"], "0200000000");

    let (status, _) = server
        .post("/api/customers/C001/witness", json!({ "first_name": "Yaw" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.get("/api/customers/C404/witness").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
