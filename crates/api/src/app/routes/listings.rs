use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use creditshop_infra::workflows::ListingKind;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Path(page): Path<String>,
) -> axum::response::Response {
    list(services, ListingKind::Products, page).await
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Path(page): Path<String>,
) -> axum::response::Response {
    list(services, ListingKind::Customers, page).await
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(page): Path<String>,
) -> axum::response::Response {
    list(services, ListingKind::Payments, page).await
}

pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Path(page): Path<String>,
) -> axum::response::Response {
    list(services, ListingKind::Purchases, page).await
}

async fn list(services: Arc<AppServices>, kind: ListingKind, page: String) -> axum::response::Response {
    // Unparseable page numbers read as the first page.
    let page_number = page.trim().parse::<i64>().unwrap_or(1);

    let listing = match services.listings().fetch_page(kind, page_number).await {
        Ok(l) => l,
        Err(e) => return errors::workflow_error_to_response(e),
    };

    let message = if listing.is_empty() { "no more data" } else { "" };
    let rows = dto::listing_rows(listing);
    let mut body = serde_json::json!({
        "error": false,
        "message": message,
        "page": page_number.max(1),
    });
    body[kind.as_str()] = rows.into();
    (StatusCode::OK, Json(body)).into_response()
}
