//! Content hierarchy queries: maps, levels, exercises
//!
//! Sibling lists are always returned in `(order_index, created_at, id)`
//! order, which is the order the progression engine expects.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{Exercise, Level, Map, NewExercise, NewLevel, NewMap};
use crate::{time, uuid_utils, Error, Result};

const SIBLING_ORDER: &str = "ORDER BY order_index ASC, created_at ASC, id ASC";

/// Authorable entity kinds, each with its own typed delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Map,
    Level,
    Exercise,
}

impl EntityKind {
    /// Delete one entity; descendants and completion records cascade
    pub async fn delete(&self, pool: &SqlitePool, id: Uuid) -> Result<()> {
        match self {
            EntityKind::Map => delete_map(pool, id).await,
            EntityKind::Level => delete_level(pool, id).await,
            EntityKind::Exercise => delete_exercise(pool, id).await,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Map => write!(f, "map"),
            EntityKind::Level => write!(f, "level"),
            EntityKind::Exercise => write!(f, "exercise"),
        }
    }
}

/// Parses the plural collection names used in URLs (`maps`, `levels`, `exercises`)
impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "maps" => Ok(EntityKind::Map),
            "levels" => Ok(EntityKind::Level),
            "exercises" => Ok(EntityKind::Exercise),
            other => Err(Error::InvalidInput(format!("Unknown entity kind: {}", other))),
        }
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn map_from_row(row: &SqliteRow) -> Result<Map> {
    Ok(Map {
        id: uuid_utils::from_db(row.get("id"))?,
        name: row.get("name"),
        description: row.get("description"),
        order_index: row.get("order_index"),
        created_at: time::from_db(row.get("created_at"))?,
    })
}

fn level_from_row(row: &SqliteRow) -> Result<Level> {
    Ok(Level {
        id: uuid_utils::from_db(row.get("id"))?,
        map_id: uuid_utils::from_db(row.get("map_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        order_index: row.get("order_index"),
        created_at: time::from_db(row.get("created_at"))?,
    })
}

fn exercise_from_row(row: &SqliteRow) -> Result<Exercise> {
    Ok(Exercise {
        id: uuid_utils::from_db(row.get("id"))?,
        level_id: uuid_utils::from_db(row.get("level_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        video_url: row.get("video_url"),
        order_index: row.get("order_index"),
        created_at: time::from_db(row.get("created_at"))?,
    })
}

// ========================================
// Maps
// ========================================

pub async fn insert_map(pool: &SqlitePool, new: NewMap) -> Result<Map> {
    let map = Map {
        id: uuid_utils::generate(),
        name: validate_name(&new.name)?,
        description: new.description,
        order_index: new.order_index,
        created_at: time::now(),
    };

    sqlx::query(
        "INSERT INTO maps (id, name, description, order_index, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(map.id.to_string())
    .bind(&map.name)
    .bind(&map.description)
    .bind(map.order_index)
    .bind(time::to_db(&map.created_at))
    .execute(pool)
    .await?;

    info!("Created map '{}' ({})", map.name, map.id);
    Ok(map)
}

pub async fn get_map(pool: &SqlitePool, id: Uuid) -> Result<Option<Map>> {
    let row = sqlx::query("SELECT * FROM maps WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(map_from_row).transpose()
}

/// Fetch a map or fail with `NotFound`
pub async fn require_map(pool: &SqlitePool, id: Uuid) -> Result<Map> {
    get_map(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("map {}", id)))
}

pub async fn list_maps(pool: &SqlitePool) -> Result<Vec<Map>> {
    let rows = sqlx::query(&format!("SELECT * FROM maps {}", SIBLING_ORDER))
        .fetch_all(pool)
        .await?;

    rows.iter().map(map_from_row).collect()
}

pub async fn delete_map(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM maps WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(Error::NotFound(format!("map {}", id)));
    }
    info!("Deleted map {} (levels, exercises and completions cascade)", id);
    Ok(())
}

// ========================================
// Levels
// ========================================

pub async fn insert_level(pool: &SqlitePool, new: NewLevel) -> Result<Level> {
    require_map(pool, new.map_id).await?;

    let level = Level {
        id: uuid_utils::generate(),
        map_id: new.map_id,
        name: validate_name(&new.name)?,
        description: new.description,
        order_index: new.order_index,
        created_at: time::now(),
    };

    sqlx::query(
        "INSERT INTO levels (id, map_id, name, description, order_index, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(level.id.to_string())
    .bind(level.map_id.to_string())
    .bind(&level.name)
    .bind(&level.description)
    .bind(level.order_index)
    .bind(time::to_db(&level.created_at))
    .execute(pool)
    .await?;

    info!("Created level '{}' ({}) in map {}", level.name, level.id, level.map_id);
    Ok(level)
}

pub async fn get_level(pool: &SqlitePool, id: Uuid) -> Result<Option<Level>> {
    let row = sqlx::query("SELECT * FROM levels WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(level_from_row).transpose()
}

/// Fetch a level or fail with `NotFound`
pub async fn require_level(pool: &SqlitePool, id: Uuid) -> Result<Level> {
    get_level(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("level {}", id)))
}

/// Levels of one map in sibling order
pub async fn list_levels(pool: &SqlitePool, map_id: Uuid) -> Result<Vec<Level>> {
    let rows = sqlx::query(&format!("SELECT * FROM levels WHERE map_id = ? {}", SIBLING_ORDER))
        .bind(map_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(level_from_row).collect()
}

/// Every level, grouped by map (admin listing)
pub async fn list_all_levels(pool: &SqlitePool) -> Result<Vec<Level>> {
    let rows = sqlx::query(
        "SELECT * FROM levels ORDER BY map_id ASC, order_index ASC, created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(level_from_row).collect()
}

pub async fn delete_level(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM levels WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(Error::NotFound(format!("level {}", id)));
    }
    info!("Deleted level {} (exercises and completions cascade)", id);
    Ok(())
}

// ========================================
// Exercises
// ========================================

pub async fn insert_exercise(pool: &SqlitePool, new: NewExercise) -> Result<Exercise> {
    require_level(pool, new.level_id).await?;

    let exercise = Exercise {
        id: uuid_utils::generate(),
        level_id: new.level_id,
        name: validate_name(&new.name)?,
        description: new.description,
        video_url: new.video_url.filter(|url| !url.trim().is_empty()),
        order_index: new.order_index,
        created_at: time::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO exercises (id, level_id, name, description, video_url, order_index, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(exercise.id.to_string())
    .bind(exercise.level_id.to_string())
    .bind(&exercise.name)
    .bind(&exercise.description)
    .bind(&exercise.video_url)
    .bind(exercise.order_index)
    .bind(time::to_db(&exercise.created_at))
    .execute(pool)
    .await?;

    info!("Created exercise '{}' ({}) in level {}", exercise.name, exercise.id, exercise.level_id);
    Ok(exercise)
}

/// Exercises of one level in sibling order
pub async fn list_exercises(pool: &SqlitePool, level_id: Uuid) -> Result<Vec<Exercise>> {
    let rows = sqlx::query(&format!(
        "SELECT * FROM exercises WHERE level_id = ? {}",
        SIBLING_ORDER
    ))
    .bind(level_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(exercise_from_row).collect()
}

/// Every exercise, grouped by level (admin listing)
pub async fn list_all_exercises(pool: &SqlitePool) -> Result<Vec<Exercise>> {
    let rows = sqlx::query(
        "SELECT * FROM exercises ORDER BY level_id ASC, order_index ASC, created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(exercise_from_row).collect()
}

pub async fn delete_exercise(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM exercises WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(Error::NotFound(format!("exercise {}", id)));
    }
    info!("Deleted exercise {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    fn new_map(name: &str, order_index: i64) -> NewMap {
        NewMap {
            name: name.to_string(),
            description: String::new(),
            order_index,
        }
    }

    #[test]
    fn test_entity_kind_parses_collection_names() {
        assert_eq!("maps".parse::<EntityKind>().unwrap(), EntityKind::Map);
        assert_eq!("levels".parse::<EntityKind>().unwrap(), EntityKind::Level);
        assert_eq!("exercises".parse::<EntityKind>().unwrap(), EntityKind::Exercise);
        assert!(matches!("users".parse::<EntityKind>(), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_maps_listed_in_order_index_order() {
        let pool = init_memory_database().await.unwrap();
        let b = insert_map(&pool, new_map("Pull", 2)).await.unwrap();
        let a = insert_map(&pool, new_map("Push", 1)).await.unwrap();
        let c = insert_map(&pool, new_map("Legs", 3)).await.unwrap();

        let ids: Vec<Uuid> = list_maps(&pool).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_equal_order_index_falls_back_to_creation_order() {
        let pool = init_memory_database().await.unwrap();
        let first = insert_map(&pool, new_map("First", 0)).await.unwrap();
        let second = insert_map(&pool, new_map("Second", 0)).await.unwrap();

        let mut expected = vec![(first.created_at, first.id), (second.created_at, second.id)];
        expected.sort();
        let expected: Vec<Uuid> = expected.into_iter().map(|(_, id)| id).collect();

        let ids: Vec<Uuid> = list_maps(&pool).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_level_requires_existing_map() {
        let pool = init_memory_database().await.unwrap();
        let result = insert_level(
            &pool,
            NewLevel {
                map_id: Uuid::new_v4(),
                name: "Orphan".to_string(),
                description: String::new(),
                order_index: 0,
            },
        )
        .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let pool = init_memory_database().await.unwrap();
        let result = insert_map(&pool, new_map("   ", 0)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_map_cascades_to_levels_and_exercises() {
        let pool = init_memory_database().await.unwrap();
        let map = insert_map(&pool, new_map("Core", 0)).await.unwrap();
        let level = insert_level(
            &pool,
            NewLevel {
                map_id: map.id,
                name: "Plank".to_string(),
                description: String::new(),
                order_index: 0,
            },
        )
        .await
        .unwrap();
        insert_exercise(
            &pool,
            NewExercise {
                level_id: level.id,
                name: "Hold 30s".to_string(),
                description: String::new(),
                video_url: None,
                order_index: 0,
            },
        )
        .await
        .unwrap();

        EntityKind::Map.delete(&pool, map.id).await.unwrap();

        assert!(get_level(&pool, level.id).await.unwrap().is_none());
        assert!(list_exercises(&pool, level.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_entity_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        for kind in [EntityKind::Map, EntityKind::Level, EntityKind::Exercise] {
            let result = kind.delete(&pool, Uuid::new_v4()).await;
            assert!(matches!(result, Err(Error::NotFound(_))), "{} delete", kind);
        }
    }

    #[tokio::test]
    async fn test_blank_video_url_stored_as_none() {
        let pool = init_memory_database().await.unwrap();
        let map = insert_map(&pool, new_map("Core", 0)).await.unwrap();
        let level = insert_level(
            &pool,
            NewLevel {
                map_id: map.id,
                name: "Hollow".to_string(),
                description: String::new(),
                order_index: 0,
            },
        )
        .await
        .unwrap();

        let exercise = insert_exercise(
            &pool,
            NewExercise {
                level_id: level.id,
                name: "Hollow hold".to_string(),
                description: "Lower back pressed down".to_string(),
                video_url: Some("  ".to_string()),
                order_index: 0,
            },
        )
        .await
        .unwrap();

        assert_eq!(exercise.video_url, None);
        assert_eq!(list_exercises(&pool, level.id).await.unwrap(), vec![exercise]);
    }
}
