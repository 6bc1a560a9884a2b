use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use creditshop_infra::workflows::{NewProduct, ProductEdit};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    let price = match dto::parse_amount("price", body.price) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let req = NewProduct {
        serial: body.serial,
        name: body.name,
        description: body.description,
        price,
        units: body.units,
        actor: actor.user_id(),
    };
    match services.registry().register_product(req).await {
        Ok(product) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "error": false,
                "message": "product registered",
                "product": dto::product_to_json(product),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Replace name, description, price and unit count. Sales already made keep
/// the price they were made at.
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(serial): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    let price = match dto::parse_amount("price", body.price) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let req = ProductEdit {
        serial,
        name: body.name,
        description: body.description,
        price,
        units: body.units,
        actor: actor.user_id(),
    };
    match services.registry().update_product(req).await {
        Ok(product) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "error": false,
                "message": "product updated",
                "product": dto::product_to_json(product),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Goods received into stock.
pub async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(serial): Path<String>,
    Json(body): Json<dto::RestockRequest>,
) -> axum::response::Response {
    let quantity = body.quantity.unwrap_or(0);
    match services
        .inventory()
        .restock(&serial, quantity, actor.user_id())
        .await
    {
        Ok(units) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "error": false,
                "message": "stock updated",
                "serial": serial,
                "units": units,
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
