//! Completion record persistence
//!
//! Records are created once per `(user_id, unit_id)` and never updated or
//! deleted here (only cascades from user/map/level deletion remove them).

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::{CompletionRecord, UnitKind};
use crate::progression::CompletionOutcome;
use crate::{time, uuid_utils, Error, Result};

/// What is being completed, with the parent context a level needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTarget {
    Map(Uuid),
    Level { level_id: Uuid, map_id: Uuid },
}

impl CompletionTarget {
    pub fn unit_id(&self) -> Uuid {
        match self {
            CompletionTarget::Map(id) => *id,
            CompletionTarget::Level { level_id, .. } => *level_id,
        }
    }

    pub fn map_id(&self) -> Uuid {
        match self {
            CompletionTarget::Map(id) => *id,
            CompletionTarget::Level { map_id, .. } => *map_id,
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            CompletionTarget::Map(_) => UnitKind::Map,
            CompletionTarget::Level { .. } => UnitKind::Level,
        }
    }

    fn level_id(&self) -> Option<Uuid> {
        match self {
            CompletionTarget::Map(_) => None,
            CompletionTarget::Level { level_id, .. } => Some(*level_id),
        }
    }
}

fn record_from_row(row: &SqliteRow) -> Result<CompletionRecord> {
    let kind: &str = row.get("unit_kind");
    let unit_kind = match kind {
        "map" => UnitKind::Map,
        "level" => UnitKind::Level,
        other => return Err(Error::Internal(format!("Unknown unit_kind '{}' in completions", other))),
    };

    Ok(CompletionRecord {
        user_id: uuid_utils::from_db(row.get("user_id"))?,
        unit_kind,
        unit_id: uuid_utils::from_db(row.get("unit_id"))?,
        map_id: uuid_utils::from_db(row.get("map_id"))?,
        completed_at: time::from_db(row.get("completed_at"))?,
    })
}

/// Persist a completion record, idempotently
///
/// A single `INSERT ... ON CONFLICT DO NOTHING` either writes the row or
/// leaves the existing one untouched, so two racing calls for the same pair
/// end with exactly one row: one caller sees `Recorded`, the other
/// `AlreadyCompleted`. Any other database failure is returned as is.
///
/// This does not check that the unit is unlocked; see
/// [`crate::progress::complete_level`] for the gated path.
pub async fn record_completion(
    pool: &SqlitePool,
    user_id: Uuid,
    target: CompletionTarget,
) -> Result<CompletionOutcome> {
    let completed_at = time::now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO completions (user_id, unit_kind, unit_id, map_id, level_id, completed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, unit_id) DO NOTHING
        "#,
    )
    .bind(user_id.to_string())
    .bind(target.kind().as_str())
    .bind(target.unit_id().to_string())
    .bind(target.map_id().to_string())
    .bind(target.level_id().map(|id| id.to_string()))
    .bind(time::to_db(&completed_at))
    .execute(pool)
    .await?
    .rows_affected();

    let record = get_completion(pool, user_id, target.unit_id())
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "completion for user {} unit {} vanished after insert",
                user_id,
                target.unit_id()
            ))
        })?;

    if inserted > 0 {
        info!(
            "User {} completed {} {}",
            user_id,
            target.kind().as_str(),
            target.unit_id()
        );
        Ok(CompletionOutcome::Recorded(record))
    } else {
        debug!(
            "User {} already completed {} {}",
            user_id,
            target.kind().as_str(),
            target.unit_id()
        );
        Ok(CompletionOutcome::AlreadyCompleted(record))
    }
}

pub async fn get_completion(
    pool: &SqlitePool,
    user_id: Uuid,
    unit_id: Uuid,
) -> Result<Option<CompletionRecord>> {
    let row = sqlx::query("SELECT * FROM completions WHERE user_id = ? AND unit_id = ?")
        .bind(user_id.to_string())
        .bind(unit_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Ids of every map the user has completed
pub async fn completed_map_ids(pool: &SqlitePool, user_id: Uuid) -> Result<HashSet<Uuid>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT unit_id FROM completions WHERE user_id = ? AND unit_kind = 'map'")
            .bind(user_id.to_string())
            .fetch_all(pool)
            .await?;

    ids.iter().map(|s| uuid_utils::from_db(s)).collect()
}

/// Ids of the levels of one map the user has completed
pub async fn completed_level_ids(
    pool: &SqlitePool,
    user_id: Uuid,
    map_id: Uuid,
) -> Result<HashSet<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT unit_id FROM completions WHERE user_id = ? AND map_id = ? AND unit_kind = 'level'",
    )
    .bind(user_id.to_string())
    .bind(map_id.to_string())
    .fetch_all(pool)
    .await?;

    ids.iter().map(|s| uuid_utils::from_db(s)).collect()
}

/// Every completion of one user, oldest first
pub async fn list_completions(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<CompletionRecord>> {
    let rows = sqlx::query("SELECT * FROM completions WHERE user_id = ? ORDER BY completed_at ASC")
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(record_from_row).collect()
}
