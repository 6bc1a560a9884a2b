use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use creditshop_customers::CustomerImages;
use creditshop_infra::workflows::{NewCustomer, ProfileEdit, WitnessForm};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

/// Opens a contract. Photos are attached out of band, so none are taken here.
pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RegisterCustomerRequest>,
) -> axum::response::Response {
    let req = NewCustomer {
        customer_id: body.customer_id,
        contact: body.contact.into(),
        agreement: body.agreement,
        months: body.months,
        images: CustomerImages::default(),
        actor: actor.user_id(),
    };
    match services.registry().register_customer(req).await {
        Ok(customer) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "error": false,
                "message": "customer registered",
                "customer": dto::customer_to_json(customer),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    let req = ProfileEdit {
        customer_id: id,
        contact: body.contact.into(),
        agreement: body.agreement,
        photo: None,
        id_card: None,
        actor: actor.user_id(),
    };
    match services.registry().update_customer_profile(req).await {
        Ok(customer) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "error": false,
                "message": "profile updated",
                "customer": dto::customer_to_json(customer),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Record the contract's witness. The witness photo is attached out of band.
pub async fn add_witness(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::WitnessRequest>,
) -> axum::response::Response {
    let req = WitnessForm {
        customer_id: id,
        details: body.into(),
        image: None,
        actor: actor.user_id(),
    };
    match services.registry().add_witness(req).await {
        Ok(witness) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "error": false,
                "message": "witness recorded",
                "witness": dto::witness_to_json(witness),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn update_witness(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::WitnessRequest>,
) -> axum::response::Response {
    let req = WitnessForm {
        customer_id: id,
        details: body.into(),
        image: None,
        actor: actor.user_id(),
    };
    match services.registry().update_witness(req).await {
        Ok(witness) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "error": false,
                "message": "witness updated",
                "witness": dto::witness_to_json(witness),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn witness(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.registry().witness(&id).await {
        Ok(witness) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "error": false,
                "message": "",
                "witness": dto::witness_to_json(witness),
            })),
        )
            .into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
