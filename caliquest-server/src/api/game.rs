//! Player surfaces: map list, map detail, level detail, level completion

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use caliquest_common::db::{CompletionRecord, Map};
use caliquest_common::progress::{self, LevelDetail, MapDetail, UnitView};
use caliquest_common::SessionContext;
use serde::Serialize;

use super::parse_id;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/maps
pub async fn list_maps(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<Vec<UnitView<Map>>>> {
    Ok(Json(progress::map_overview(&state.db, session.user_id).await?))
}

/// GET /api/maps/:id
pub async fn get_map(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MapDetail>> {
    let map_id = parse_id(&id)?;
    let detail = progress::map_detail(&state.db, session.user_id, map_id, state.progress_policy()).await?;
    Ok(Json(detail))
}

/// GET /api/levels/:id
pub async fn get_level(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<LevelDetail>> {
    let level_id = parse_id(&id)?;
    let detail =
        progress::level_detail(&state.db, session.user_id, level_id, state.progress_policy()).await?;
    Ok(Json(detail))
}

#[derive(Debug, Serialize)]
pub struct CompleteLevelResponse {
    pub record: CompletionRecord,
    /// False when the level had already been completed
    pub newly_recorded: bool,
    /// True when every level of the map is now complete
    pub map_completed: bool,
    /// True only for the call that completed the map
    pub map_newly_completed: bool,
}

/// POST /api/levels/:id/complete
pub async fn complete_level(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<CompleteLevelResponse>> {
    let level_id = parse_id(&id)?;
    let done =
        progress::complete_level(&state.db, session.user_id, level_id, state.progress_policy()).await?;

    Ok(Json(CompleteLevelResponse {
        record: done.level.record().clone(),
        newly_recorded: done.level.is_newly_recorded(),
        map_completed: done.map.is_some(),
        map_newly_completed: done.map_newly_completed(),
    }))
}
