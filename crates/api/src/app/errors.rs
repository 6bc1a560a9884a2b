use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use creditshop_infra::WorkflowError;

/// Map a workflow failure to a JSON error response.
///
/// Storage failures are logged here with their cause; the caller only sees a
/// message asking to resubmit.
pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    match err {
        WorkflowError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        WorkflowError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, msg),
        WorkflowError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg),
        WorkflowError::InvariantViolation(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, msg),
        err @ WorkflowError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        WorkflowError::Retrieval(cause) => {
            tracing::error!(%cause, "read failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "could not load data, please try again")
        }
        WorkflowError::Persistence(cause) => {
            tracing::error!(%cause, "write failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "could not save, please try again")
        }
        WorkflowError::Timeout(cause) => {
            tracing::warn!(%cause, "storage timed out");
            json_error(StatusCode::GATEWAY_TIMEOUT, "the request timed out, please try again")
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": true,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (WorkflowError::validation("x"), StatusCode::BAD_REQUEST),
            (WorkflowError::not_found("x"), StatusCode::NOT_FOUND),
            (WorkflowError::conflict("x"), StatusCode::CONFLICT),
            (
                WorkflowError::InsufficientStock {
                    serial: "P1".to_string(),
                    requested: 2,
                    available: 1,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (WorkflowError::Persistence("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
            (WorkflowError::Timeout("x".to_string()), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(workflow_error_to_response(err).status(), status);
        }
    }
}
