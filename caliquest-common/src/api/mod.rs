//! Account and session-token management shared by the HTTP service
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (password hashing, input normalization)
//! - Database operations (via sqlx)
//! - Shared request/response types
//!
//! The server wraps these with framework-specific extractors and middleware.

pub mod auth;
pub mod types;

pub use auth::{
    hash_password, normalize_email, request_password_reset, reset_password, resolve_session,
    sign_in, sign_out, sign_up, verify_password, MIN_PASSWORD_LEN,
};
pub use types::{
    ErrorBody, ErrorDetail, PasswordResetConfirm, PasswordResetRequest, SessionToken, SignInRequest,
    SignUpRequest,
};
