//! HTTP error mapping
//!
//! Every failure leaves the service as `{"error": {"code", "message"}}` with
//! a status derived from the underlying [`caliquest_common::Error`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use caliquest_common::api::ErrorBody;
use caliquest_common::Error;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Error from the shared library
    #[error(transparent)]
    Common(#[from] Error),
}

impl ApiError {
    /// Status and stable error code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Common(err) => match err {
                Error::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
                Error::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                Error::Locked(_) => (StatusCode::FORBIDDEN, "LOCKED"),
                Error::OnboardingRequired => (StatusCode::FORBIDDEN, "ONBOARDING_REQUIRED"),
                Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                Error::AlreadyOnboarded => (StatusCode::CONFLICT, "ALREADY_ONBOARDED"),
                Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                Error::SchemaMissing(_) => (StatusCode::SERVICE_UNAVAILABLE, "SCHEMA_MISSING"),
                Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                Error::Config(_) | Error::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Server-side failures are logged in full but not echoed to the client
        let message = if status.is_server_error() {
            error!("{}", self);
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Database schema not initialized".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}
