//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::InvalidQuantity
        | DomainError::EmptyCart
        | DomainError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::CartNotActive(_)
        | DomainError::InvalidTransition { .. }
        | DomainError::NotPaid(_)
        | DomainError::NotShipped(_) => (StatusCode::CONFLICT, err.to_string()),
        // A guarded status flip lost a race; the client can retry against
        // the order's current state.
        DomainError::Store(StoreError::StatusConflict { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{OrderId, OrderStatus};

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases = [
            (
                ApiError::Domain(DomainError::not_found("order", "x")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Domain(DomainError::Forbidden),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Domain(DomainError::EmptyCart),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Domain(DomainError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Paid,
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Domain(DomainError::Store(StoreError::StatusConflict {
                    order: OrderId::new(),
                    expected: OrderStatus::New,
                })),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::BadRequest("nope".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
