use crate::domain::error::BookingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype over the domain error so the HTTP mapping lives in the adapter
/// layer.
pub struct ApiError(pub BookingError);

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            BookingError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            BookingError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            BookingError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            BookingError::Gateway { kind, message } => {
                // Passthrough of the gateway's own classification; the
                // client decides whether to retry.
                let body = serde_json::json!({
                    "error_code": "gateway_error",
                    "gateway_kind": kind,
                    "message": message,
                });
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            BookingError::WebhookSignature(_) => (
                StatusCode::BAD_REQUEST,
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            BookingError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            BookingError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
