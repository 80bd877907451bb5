//! Per-user progress views and the gated level-completion flow
//!
//! Glue between the persistence layer and the pure engine in
//! [`crate::progression`]: load the ordered siblings and the user's completed
//! set, derive accessibility, and (optionally) refuse access to locked units.

use serde::Serialize;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::completions::{self, CompletionTarget};
use crate::db::models::{Exercise, Level, Map};
use crate::db::units;
use crate::progression::{accessibility_of, compute_accessibility, Accessibility, CompletionOutcome, UnitState};
use crate::{Error, Result};

/// When a map's completion record is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapCompletionRule {
    /// Completing any level of the map completes the map
    #[default]
    FirstLevel,
    /// The map completes once every one of its levels is complete
    AllLevels,
}

impl MapCompletionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstLevel => "first_level",
            Self::AllLevels => "all_levels",
        }
    }
}

impl FromStr for MapCompletionRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first_level" => Ok(Self::FirstLevel),
            "all_levels" => Ok(Self::AllLevels),
            other => Err(Error::InvalidInput(format!("unknown map completion rule '{}'", other))),
        }
    }
}

/// How strictly the unlock rule is applied to reads and completions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPolicy {
    /// Reject access to and completion of locked units
    pub enforce_unlock: bool,
    pub map_completion: MapCompletionRule,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            enforce_unlock: true,
            map_completion: MapCompletionRule::default(),
        }
    }
}

/// A unit together with its derived accessibility
#[derive(Debug, Clone, Serialize)]
pub struct UnitView<T> {
    #[serde(flatten)]
    pub unit: T,
    pub unlocked: bool,
    pub completed: bool,
    pub state: UnitState,
}

impl<T> UnitView<T> {
    fn new(unit: T, access: Accessibility) -> Self {
        Self {
            unit,
            unlocked: access.unlocked,
            completed: access.completed,
            state: access.state(),
        }
    }
}

/// A map with its levels, all annotated for one user
#[derive(Debug, Clone, Serialize)]
pub struct MapDetail {
    pub map: UnitView<Map>,
    pub levels: Vec<UnitView<Level>>,
}

/// A level with its ordered exercises
#[derive(Debug, Clone, Serialize)]
pub struct LevelDetail {
    pub level: UnitView<Level>,
    pub exercises: Vec<Exercise>,
}

/// Result of completing a level
#[derive(Debug, Clone)]
pub struct LevelCompletion {
    pub level: CompletionOutcome,
    /// Map completion, once the map's completion rule is satisfied
    pub map: Option<CompletionOutcome>,
}

impl LevelCompletion {
    /// True only when this call is the one that completed the map
    pub fn map_newly_completed(&self) -> bool {
        self.map.as_ref().is_some_and(|m| m.is_newly_recorded())
    }
}

/// All maps in order with the user's accessibility
pub async fn map_overview(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<UnitView<Map>>> {
    let maps = units::list_maps(pool).await?;
    let done = completions::completed_map_ids(pool, user_id).await?;
    let mut access = compute_accessibility(&maps, &done);

    Ok(maps
        .into_iter()
        .map(|map| {
            let a = access.remove(&map.id).unwrap_or_default();
            UnitView::new(map, a)
        })
        .collect())
}

async fn map_access(pool: &SqlitePool, user_id: Uuid, map_id: Uuid) -> Result<Accessibility> {
    let maps = units::list_maps(pool).await?;
    let done = completions::completed_map_ids(pool, user_id).await?;
    accessibility_of(&maps, &done, map_id).ok_or_else(|| Error::NotFound(format!("map {}", map_id)))
}

fn ensure_unlocked(policy: ProgressPolicy, access: Accessibility, what: impl FnOnce() -> String) -> Result<()> {
    if policy.enforce_unlock && !access.unlocked && !access.completed {
        return Err(Error::Locked(what()));
    }
    Ok(())
}

/// One map with its levels annotated for the user
pub async fn map_detail(
    pool: &SqlitePool,
    user_id: Uuid,
    map_id: Uuid,
    policy: ProgressPolicy,
) -> Result<MapDetail> {
    let map = units::require_map(pool, map_id).await?;
    let map_acc = map_access(pool, user_id, map_id).await?;
    ensure_unlocked(policy, map_acc, || format!("map '{}'", map.name))?;

    let levels = units::list_levels(pool, map_id).await?;
    let done = completions::completed_level_ids(pool, user_id, map_id).await?;
    let mut access = compute_accessibility(&levels, &done);

    let levels = levels
        .into_iter()
        .map(|level| {
            let a = access.remove(&level.id).unwrap_or_default();
            UnitView::new(level, a)
        })
        .collect();

    Ok(MapDetail {
        map: UnitView::new(map, map_acc),
        levels,
    })
}

async fn level_access(pool: &SqlitePool, user_id: Uuid, level: &Level) -> Result<Accessibility> {
    let siblings = units::list_levels(pool, level.map_id).await?;
    let done = completions::completed_level_ids(pool, user_id, level.map_id).await?;
    accessibility_of(&siblings, &done, level.id)
        .ok_or_else(|| Error::NotFound(format!("level {}", level.id)))
}

/// Load a level and check that both it and its map may be entered
async fn open_level(
    pool: &SqlitePool,
    user_id: Uuid,
    level_id: Uuid,
    policy: ProgressPolicy,
) -> Result<(Level, Accessibility)> {
    let level = units::require_level(pool, level_id).await?;

    if policy.enforce_unlock {
        let map_acc = map_access(pool, user_id, level.map_id).await?;
        ensure_unlocked(policy, map_acc, || format!("map {}", level.map_id))?;
    }

    let access = level_access(pool, user_id, &level).await?;
    ensure_unlocked(policy, access, || format!("level '{}'", level.name))?;
    Ok((level, access))
}

/// One level with its exercises
pub async fn level_detail(
    pool: &SqlitePool,
    user_id: Uuid,
    level_id: Uuid,
    policy: ProgressPolicy,
) -> Result<LevelDetail> {
    let (level, access) = open_level(pool, user_id, level_id, policy).await?;
    let exercises = units::list_exercises(pool, level_id).await?;

    Ok(LevelDetail {
        level: UnitView::new(level, access),
        exercises,
    })
}

/// Complete a level and roll the map up per `policy.map_completion`
///
/// Replaying a completion is harmless: the level outcome is
/// `AlreadyCompleted` and the roll-up re-checks without writing twice.
pub async fn complete_level(
    pool: &SqlitePool,
    user_id: Uuid,
    level_id: Uuid,
    policy: ProgressPolicy,
) -> Result<LevelCompletion> {
    let (level, _) = open_level(pool, user_id, level_id, policy).await?;

    let outcome = completions::record_completion(
        pool,
        user_id,
        CompletionTarget::Level {
            level_id: level.id,
            map_id: level.map_id,
        },
    )
    .await?;

    let map_done = match policy.map_completion {
        MapCompletionRule::FirstLevel => true,
        MapCompletionRule::AllLevels => {
            let levels = units::list_levels(pool, level.map_id).await?;
            let done = completions::completed_level_ids(pool, user_id, level.map_id).await?;
            let all_done = levels.iter().all(|l| done.contains(&l.id));
            if !all_done {
                debug!(
                    "User {} has {}/{} levels of map {}",
                    user_id,
                    done.len(),
                    levels.len(),
                    level.map_id
                );
            }
            all_done
        }
    };

    let map = if map_done {
        let map_outcome =
            completions::record_completion(pool, user_id, CompletionTarget::Map(level.map_id)).await?;
        if map_outcome.is_newly_recorded() {
            info!(
                "User {} completed map {} ({})",
                user_id,
                level.map_id,
                policy.map_completion.as_str()
            );
        }
        Some(map_outcome)
    } else {
        None
    };

    Ok(LevelCompletion { level: outcome, map })
}
