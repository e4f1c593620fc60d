use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::pages;

/// Error taxonomy for the HTTP surface. All error responses carry
/// human-readable text, not a structured payload.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Checked before route matching; blocks every route with the error page.
    #[error("settings store is not configured")]
    StoreNotConfigured,
    /// JSON parse or store write failure; renders as `Failed to {action}`.
    #[error("failed to {action}")]
    Failed { action: &'static str },
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Invalid password")]
    InvalidPassword,
    #[error("upstream relay failed: {0}")]
    UpstreamRelay(#[from] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::StoreNotConfigured | ApiError::Failed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidPassword => StatusCode::UNAUTHORIZED,
            ApiError::UpstreamRelay(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::StoreNotConfigured => pages::html(status, pages::STORE_ERROR_HTML),
            ApiError::Failed { action } => (status, format!("Failed to {action}")).into_response(),
            ApiError::BadRequest(message) => (status, message).into_response(),
            ApiError::InvalidPassword => (status, "Invalid password").into_response(),
            ApiError::UpstreamRelay(_) => (status, "Upstream DNS request failed").into_response(),
        }
    }
}
