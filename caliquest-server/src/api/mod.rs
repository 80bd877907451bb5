//! HTTP API handlers for caliquest-server

pub mod admin;
pub mod auth;
pub mod buildinfo;
pub mod game;
pub mod health;
pub mod session;

pub use admin::{
    admin_create_exercise, admin_create_level, admin_create_map, admin_delete,
    admin_list_exercises, admin_list_levels, admin_list_maps, admin_upload,
};
pub use auth::{
    confirm_password_reset, request_password_reset, require_admin, require_onboarded,
    require_session, sign_in, sign_out, sign_up,
};
pub use buildinfo::get_build_info;
pub use game::{complete_level, get_level, get_map, list_maps};
pub use health::health_routes;
pub use session::{get_session, setup_profile};

use crate::error::ApiResult;
use caliquest_common::uuid_utils;
use uuid::Uuid;

/// Parse an id path segment, answering 400 in the usual error envelope
pub(crate) fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Ok(uuid_utils::parse(raw)?)
}
