//! Admin authoring: maps, levels, exercises and video upload
//!
//! Every route here sits behind `require_admin`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use caliquest_common::blob::{self, StoredBlob, EXERCISE_PREFIX};
use caliquest_common::db::units::{self, EntityKind};
use caliquest_common::db::{Exercise, Level, Map, NewExercise, NewLevel, NewMap};
use serde::Deserialize;
use tracing::info;

use super::parse_id;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/admin/maps
pub async fn admin_list_maps(State(state): State<AppState>) -> ApiResult<Json<Vec<Map>>> {
    Ok(Json(units::list_maps(&state.db).await?))
}

/// POST /api/admin/maps
pub async fn admin_create_map(
    State(state): State<AppState>,
    Json(new): Json<NewMap>,
) -> ApiResult<(StatusCode, Json<Map>)> {
    let map = units::insert_map(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(map)))
}

/// GET /api/admin/levels
pub async fn admin_list_levels(State(state): State<AppState>) -> ApiResult<Json<Vec<Level>>> {
    Ok(Json(units::list_all_levels(&state.db).await?))
}

/// POST /api/admin/levels
pub async fn admin_create_level(
    State(state): State<AppState>,
    Json(new): Json<NewLevel>,
) -> ApiResult<(StatusCode, Json<Level>)> {
    let level = units::insert_level(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(level)))
}

/// GET /api/admin/exercises
pub async fn admin_list_exercises(State(state): State<AppState>) -> ApiResult<Json<Vec<Exercise>>> {
    Ok(Json(units::list_all_exercises(&state.db).await?))
}

/// POST /api/admin/exercises
pub async fn admin_create_exercise(
    State(state): State<AppState>,
    Json(new): Json<NewExercise>,
) -> ApiResult<(StatusCode, Json<Exercise>)> {
    let exercise = units::insert_exercise(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(exercise)))
}

/// DELETE /api/admin/:kind/:id
///
/// `kind` is `maps`, `levels` or `exercises`; descendants and completion
/// records go with the deleted unit.
pub async fn admin_delete(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let kind: EntityKind = kind.parse()?;
    let id = parse_id(&id)?;

    kind.delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// POST /api/admin/uploads?filename=<name>
///
/// Raw request body is the video file. The returned URL goes into the
/// `video_url` of a subsequent exercise create.
pub async fn admin_upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<StoredBlob>)> {
    if !blob::is_video_name(&query.filename) {
        return Err(ApiError::BadRequest(format!(
            "unsupported video type '{}' (expected one of: {})",
            query.filename,
            blob::VIDEO_EXTENSIONS.join(", ")
        )));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".to_string()));
    }

    let stored = state.blobs.put(EXERCISE_PREFIX, &query.filename, &body).await?;
    info!("Uploaded exercise video {} ({} bytes)", stored.key, body.len());
    Ok((StatusCode::CREATED, Json(stored)))
}
