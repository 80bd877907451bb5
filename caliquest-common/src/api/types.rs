//! Shared API request/response types

use serde::{Deserialize, Serialize};

// ========================================
// Authentication Types
// ========================================

/// Body of `POST /api/auth/sign-up`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/sign-in`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Bearer token handed back on sign-in
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionToken {
    pub token: String,
}

/// Body of `POST /api/auth/password-reset`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Body of `POST /api/auth/password-reset/confirm`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

// ========================================
// Error Response Types
// ========================================

/// Error envelope: `{"error": {"code": ..., "message": ...}}`
///
/// # Examples
///
/// ```
/// use caliquest_common::api::types::ErrorBody;
///
/// let body = ErrorBody::new("LOCKED", "Locked: level 'Plank'");
/// assert_eq!(body.error.code, "LOCKED");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable identifier
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
