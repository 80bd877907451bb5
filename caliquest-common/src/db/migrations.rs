//! Database schema migrations
//!
//! Versioned, idempotent schema changes tracked in `schema_version`.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every migration must be safe to re-run
//! 4. **Use ALTER TABLE** - prefer ALTER TABLE over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: ordering and lookup indexes
///
/// Sibling lists are always read as `ORDER BY order_index, created_at, id`
/// filtered by parent, and completions are read per (user, map).
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: ordering and completion indexes");

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_maps_order ON maps (order_index, created_at, id)",
        "CREATE INDEX IF NOT EXISTS idx_levels_map_order ON levels (map_id, order_index, created_at, id)",
        "CREATE INDEX IF NOT EXISTS idx_exercises_level_order ON exercises (level_id, order_index, created_at, id)",
        "CREATE INDEX IF NOT EXISTS idx_completions_user_map ON completions (user_id, map_id, unit_kind)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions (user_id)",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: add video_url column to exercises
///
/// **Background:** exercises were first authored with inline descriptions
/// only; uploaded instructional video came later.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add video_url column to exercises");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('exercises') WHERE name = 'video_url'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  video_url column already exists - skipping");
        return Ok(());
    }

    match sqlx::query("ALTER TABLE exercises ADD COLUMN video_url TEXT")
        .execute(pool)
        .await
    {
        Ok(_) => {
            info!("  ✓ Added video_url column to exercises table");
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("  video_url column added by concurrent initializer - skipping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
