use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use creditshop_infra::workflows::{CorrectItemRequest, PostItem};
use creditshop_sales::CatalogSnapshot;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

/// Credit sale. Priced from the catalog the form carried, or from current
/// prices when it carried none.
pub async fn post_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::PostItemRequest>,
) -> axum::response::Response {
    let deposit = match dto::parse_amount("deposit", body.deposit) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let catalog = match catalog_for(&services, body.catalog, &body.serial).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let req = PostItem {
        customer_id: body.customer_id,
        serial: body.serial,
        quantity: body.quantity.unwrap_or(0),
        deposit,
        actor: actor.user_id(),
    };
    match services.intake().post_item(req, &catalog).await {
        Ok(posted) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "error": false,
                "message": "item recorded",
                "item": dto::posted_item_to_json(posted),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Fix a mis-keyed sale.
pub async fn correct_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CorrectItemRequest>,
) -> axum::response::Response {
    let deposit = match dto::parse_amount("deposit", body.deposit) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let catalog = match body.catalog {
        Some(prices) => match dto::to_catalog(prices) {
            Ok(c) => c,
            Err(resp) => return resp,
        },
        None => match current_catalog_of_item(&services, &id).await {
            Ok(c) => c,
            Err(resp) => return resp,
        },
    };

    let req = CorrectItemRequest {
        item_id: id,
        quantity: body.quantity.unwrap_or(0),
        deposit,
        actor: actor.user_id(),
    };
    match services.registry().correct_item(req, &catalog).await {
        Ok(item) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "error": false,
                "message": "item updated",
                "item": dto::item_to_json(item),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

async fn catalog_for(
    services: &AppServices,
    submitted: Option<std::collections::BTreeMap<String, serde_json::Value>>,
    serial: &str,
) -> Result<CatalogSnapshot, axum::response::Response> {
    match submitted {
        Some(prices) => dto::to_catalog(prices),
        None => services
            .current_catalog(&[serial])
            .await
            .map_err(errors::workflow_error_to_response),
    }
}

/// Without a submitted catalog the item keeps its own serial's current price.
async fn current_catalog_of_item(
    services: &AppServices,
    item_id: &str,
) -> Result<CatalogSnapshot, axum::response::Response> {
    let Ok(id) = item_id.trim().parse() else {
        return Ok(CatalogSnapshot::new());
    };
    let serial = match services.item_serial(&id).await {
        Ok(Some(serial)) => serial,
        Ok(None) => return Ok(CatalogSnapshot::new()),
        Err(e) => return Err(errors::workflow_error_to_response(e)),
    };
    services
        .current_catalog(&[serial.as_str()])
        .await
        .map_err(errors::workflow_error_to_response)
}
