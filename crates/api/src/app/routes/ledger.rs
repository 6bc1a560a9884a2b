use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Outstanding balance and monthly installment for one customer.
pub async fn customer_debt(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let summary = match services.calculator().debt_summary(&id).await {
        Ok(s) => s,
        Err(e) => return errors::workflow_error_to_response(e),
    };

    let mut body = dto::debt_to_json(&summary);
    match summary.installment {
        Some(_) => {
            body["error"] = false.into();
            body["message"] = "".into();
        }
        None => {
            body["error"] = true.into();
            body["message"] = "Customer is fully paid".into();
        }
    }
    (StatusCode::OK, Json(body)).into_response()
}

/// Open contracts whose installment falls due today.
pub async fn owing_today(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let today = Utc::now().date_naive();
    let owing = match services.calculator().owing_today(today).await {
        Ok(o) => o,
        Err(e) => return errors::workflow_error_to_response(e),
    };

    let customers = owing.into_iter().map(dto::owing_to_json).collect::<Vec<_>>();
    let message = if customers.is_empty() { "no customer owes today" } else { "" };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "error": false,
            "message": message,
            "date": today.to_string(),
            "customers": customers,
        })),
    )
        .into_response()
}
