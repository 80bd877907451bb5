//! Account endpoints and the session guards
//!
//! Clients authenticate with `Authorization: Bearer <token>`. The
//! [`require_session`] middleware resolves the token, loads the
//! [`SessionContext`] and stores it in the request extensions, where the
//! handlers and the narrower guards pick it up.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use caliquest_common::api::{
    self as accounts, PasswordResetConfirm, PasswordResetRequest, SessionToken, SignInRequest,
    SignUpRequest,
};
use caliquest_common::{Error, SessionContext};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Raw bearer token of the current request
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

fn bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn session_of(request: &Request) -> ApiResult<&SessionContext> {
    request
        .extensions()
        .get::<SessionContext>()
        .ok_or(ApiError::Common(Error::Unauthenticated))
}

/// Resolve the bearer token into a `SessionContext`
///
/// Missing, unknown and expired tokens all answer 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let Some(token) = bearer_token(&request) else {
        return Err(Error::Unauthenticated.into());
    };

    let Some(user_id) = accounts::resolve_session(&state.db, &token).await? else {
        debug!("Rejected unknown or expired session token");
        return Err(Error::Unauthenticated.into());
    };

    let context = SessionContext::load(&state.db, user_id).await?;
    request.extensions_mut().insert(context);
    request.extensions_mut().insert(BearerToken(token));

    Ok(next.run(request).await)
}

/// Game surfaces: profile setup must be complete
pub async fn require_onboarded(request: Request, next: Next) -> ApiResult<Response> {
    session_of(&request)?.require_onboarded()?;
    Ok(next.run(request).await)
}

/// Admin surfaces: `is_admin` must be set on the profile
pub async fn require_admin(request: Request, next: Next) -> ApiResult<Response> {
    let session = session_of(&request)?;
    if let Err(e) = session.require_admin() {
        debug!("User {} denied admin access", session.user_id);
        return Err(e.into());
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user_id: Uuid,
    pub token: String,
}

/// POST /api/auth/sign-up
///
/// Creates the account and signs it in right away.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    let user_id = accounts::sign_up(&state.db, &req.email, &req.password).await?;
    let token = accounts::sign_in(
        &state.db,
        &req.email,
        &req.password,
        state.settings.session_ttl_seconds,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(SignUpResponse { user_id, token })))
}

/// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<SessionToken>> {
    let token = accounts::sign_in(
        &state.db,
        &req.email,
        &req.password,
        state.settings.session_ttl_seconds,
    )
    .await?;

    Ok(Json(SessionToken { token }))
}

/// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult<StatusCode> {
    accounts::sign_out(&state.db, &token.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/password-reset
///
/// Answers 202 whether or not the email is known.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    match accounts::request_password_reset(
        &state.db,
        &req.email,
        state.settings.password_reset_ttl_seconds,
    )
    .await
    {
        Ok(_) | Err(Error::InvalidInput(_)) => {}
        Err(e) => return Err(e.into()),
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

/// POST /api/auth/password-reset/confirm
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirm>,
) -> ApiResult<StatusCode> {
    accounts::reset_password(&state.db, &req.token, &req.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/session");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&request_with(Some("Bearer abc"))), Some("abc".to_string()));
        assert_eq!(bearer_token(&request_with(Some("bearer  abc "))), Some("abc".to_string()));
        assert_eq!(bearer_token(&request_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&request_with(None)), None);
    }
}
