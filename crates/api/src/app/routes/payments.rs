use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use creditshop_infra::workflows::RecordPaymentRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

/// Installment payment. Closes the contract when it clears the balance.
pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let amount = match dto::parse_amount("amount", body.amount) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let req = RecordPaymentRequest {
        customer_id: body.customer_id,
        month: body.month,
        amount,
        actor: actor.user_id(),
    };
    match services.payments().record_payment(req).await {
        Ok(receipt) => {
            let message = if receipt.balance.is_zero() {
                "payment recorded; contract closed"
            } else {
                "payment recorded"
            };
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "error": false,
                    "message": message,
                    "receipt": dto::receipt_to_json(receipt),
                })),
            )
                .into_response()
        }
        Err(e) => errors::workflow_error_to_response(e),
    }
}
