use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use creditshop_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "x-user-id";

pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let user_id = match extract_actor(req.headers()) {
        Ok(id) => id,
        Err(message) => return errors::json_error(StatusCode::UNAUTHORIZED, message),
    };

    req.extensions_mut().insert(ActorContext::new(user_id));
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Result<UserId, &'static str> {
    let header = headers
        .get(ACTOR_HEADER)
        .ok_or("x-user-id header is required")?;

    let value = header.to_str().map_err(|_| "x-user-id header is not valid text")?;
    value
        .trim()
        .parse::<UserId>()
        .map_err(|_| "x-user-id header is not a valid user id")
}
