//! Profile queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::models::{Profile, ProfileSetup};
use crate::error::is_unique_violation;
use crate::{time, uuid_utils, Error, Result};

/// Avatar used when the user supplies none at setup
pub fn default_avatar_url(username: &str) -> String {
    format!("https://picsum.photos/seed/{}/200", username)
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    Ok(Profile {
        id: uuid_utils::from_db(row.get("id"))?,
        username: row.get("username"),
        age: row.get("age"),
        avatar_url: row.get("avatar_url"),
        is_admin: row.get("is_admin"),
        onboarding_completed: row.get("onboarding_completed"),
    })
}

/// Fetch a profile; `None` means the user has not completed setup yet
pub async fn get_profile(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Profile>> {
    let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// One-time profile setup
///
/// Creates (or fills in) the profile and sets `onboarding_completed`. The
/// admin flag is never touched. Fails with `AlreadyOnboarded` when setup was
/// already completed and with `Conflict` when the username is taken.
pub async fn complete_onboarding(
    pool: &SqlitePool,
    user_id: Uuid,
    setup: ProfileSetup,
) -> Result<Profile> {
    let username = setup.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::InvalidInput("username cannot be empty".to_string()));
    }
    if !(1..=150).contains(&setup.age) {
        return Err(Error::InvalidInput(format!("age out of range: {}", setup.age)));
    }
    let avatar_url = setup
        .avatar_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| default_avatar_url(&username));

    if let Some(existing) = get_profile(pool, user_id).await? {
        if existing.onboarding_completed {
            return Err(Error::AlreadyOnboarded);
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO profiles (id, username, age, avatar_url, onboarding_completed, updated_at)
        VALUES (?, ?, ?, ?, 1, ?)
        ON CONFLICT (id) DO UPDATE SET
            username = excluded.username,
            age = excluded.age,
            avatar_url = excluded.avatar_url,
            onboarding_completed = 1,
            updated_at = excluded.updated_at
        WHERE profiles.onboarding_completed = 0
        "#,
    )
    .bind(user_id.to_string())
    .bind(&username)
    .bind(setup.age)
    .bind(&avatar_url)
    .bind(time::to_db(&time::now()))
    .execute(pool)
    .await;

    match result {
        // A concurrent setup finished between the check above and the upsert
        Ok(done) if done.rows_affected() == 0 => return Err(Error::AlreadyOnboarded),
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict(format!("username '{}' is taken", username)));
        }
        Err(e) => return Err(e.into()),
    }

    info!("User {} completed profile setup as '{}'", user_id, username);
    get_profile(pool, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("profile {} missing after setup", user_id)))
}

/// Grant or revoke the admin flag (operator action, never exposed over HTTP)
pub async fn set_admin(pool: &SqlitePool, user_id: Uuid, is_admin: bool) -> Result<()> {
    let updated = sqlx::query("UPDATE profiles SET is_admin = ?, updated_at = ? WHERE id = ?")
        .bind(is_admin)
        .bind(time::to_db(&time::now()))
        .bind(user_id.to_string())
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!(
            "profile {} (the user must complete profile setup first)",
            user_id
        )));
    }

    info!("Set is_admin={} for user {}", is_admin, user_id);
    Ok(())
}
