use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::DomainError;

/// Map a domain error onto the HTTP surface.
///
/// Conflicts with current state (terminal orders, stock shortfalls,
/// duplicate names) are 409; an update that fails to cover an existing
/// order line is a well-formed but unprocessable request, 422.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InvalidState(_) => json_error(StatusCode::CONFLICT, "invalid_state", message),
        DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        DomainError::MissingLine { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "missing_line", message)
        }
        DomainError::InvalidArgument(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_argument", message)
        }
        DomainError::AlreadyExists { .. } => {
            json_error(StatusCode::CONFLICT, "already_exists", message)
        }
        DomainError::Internal(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
