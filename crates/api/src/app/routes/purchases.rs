use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use creditshop_infra::workflows::RecordPurchaseRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

/// Cash sale over the counter.
pub async fn record_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RecordPurchaseRequest>,
) -> axum::response::Response {
    let amount = match dto::parse_amount("amount", body.amount) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let req = RecordPurchaseRequest {
        serial: body.serial,
        quantity: body.quantity.unwrap_or(0),
        amount,
        actor: actor.user_id(),
    };
    match services.purchases().record_purchase(req).await {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "error": false,
                "message": "purchase recorded",
                "purchase": dto::recorded_purchase_to_json(recorded),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
