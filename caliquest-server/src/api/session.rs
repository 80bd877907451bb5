//! Session introspection and one-time profile setup

use axum::{extract::State, Extension, Json};
use caliquest_common::db::{profiles, ProfileSetup};
use caliquest_common::session::Surface;
use caliquest_common::SessionContext;
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionContext,
    /// Surface the client should show first
    pub home: Surface,
}

impl From<SessionContext> for SessionResponse {
    fn from(session: SessionContext) -> Self {
        let home = Surface::home(Some(&session));
        Self { session, home }
    }
}

/// GET /api/session
pub async fn get_session(Extension(session): Extension<SessionContext>) -> Json<SessionResponse> {
    Json(session.into())
}

/// PUT /api/profile
///
/// Only valid before onboarding; answers with the refreshed session.
pub async fn setup_profile(
    State(state): State<AppState>,
    Extension(mut session): Extension<SessionContext>,
    Json(setup): Json<ProfileSetup>,
) -> ApiResult<Json<SessionResponse>> {
    session.require_profile_setup()?;
    profiles::complete_onboarding(&state.db, session.user_id, setup).await?;
    session.refresh(&state.db).await?;

    Ok(Json(session.into()))
}
