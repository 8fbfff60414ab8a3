//! HTTP error mapping for `ClaimsError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use claims_core::ClaimsError;

pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Wrapper so handlers can `?` domain and store errors straight into a response.
#[derive(Debug)]
pub struct AppError(pub ClaimsError);

impl From<ClaimsError> for AppError {
    fn from(e: ClaimsError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self(ClaimsError::Internal(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self.0 {
            ClaimsError::Internal(e) => {
                tracing::error!(error = %format!("{:#}", e), "Request failed");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
