//! Email/password accounts with opaque bearer session tokens
//!
//! # Storage
//!
//! - `users`: one row per account; password stored as SHA-256 of
//!   `salt || password` (both hex), salt is 16 random bytes
//! - `sessions`: token (32 random bytes, hex) with an expiry
//! - `password_resets`: one-time tokens consumed by [`reset_password`]
//!
//! Everything the rest of the service sees is "a user id or none", via
//! [`resolve_session`].

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MAX_TTL_SECONDS;
use crate::error::is_unique_violation;
use crate::{time, uuid_utils, Error, Result};

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

const SALT_BYTES: usize = 16;
const TOKEN_BYTES: usize = 32;

// ========================================
// Hashing
// ========================================

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 over `salt || password`, as 64 hex characters
///
/// # Examples
///
/// ```
/// use caliquest_common::api::auth::hash_password;
///
/// let hash = hash_password("00ff", "hunter22");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_password("00ff", "hunter22"));
/// ```
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare a password against a stored salt and hash
pub fn verify_password(salt: &str, password: &str, expected_hash: &str) -> bool {
    let calculated = hash_password(salt, password);
    calculated.len() == expected_hash.len()
        && calculated
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

// ========================================
// Input validation
// ========================================

/// Trim and lower-case an email, rejecting anything without `@`
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::InvalidInput(format!("invalid email address '{}'", email))),
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// ========================================
// Accounts
// ========================================

/// Create an account, returning the new user id
pub async fn sign_up(pool: &SqlitePool, email: &str, password: &str) -> Result<Uuid> {
    let email = normalize_email(email)?;
    validate_password(password)?;

    let id = uuid_utils::generate();
    let salt = random_hex(SALT_BYTES);

    let result = sqlx::query(
        "INSERT INTO users (id, email, password_hash, password_salt, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&email)
    .bind(hash_password(&salt, password))
    .bind(&salt)
    .bind(time::to_db(&time::now()))
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            info!("Created account {} for {}", id, email);
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => {
            Err(Error::Conflict(format!("an account for {} already exists", email)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Look up a user id by email
pub async fn find_user_id(pool: &SqlitePool, email: &str) -> Result<Option<Uuid>> {
    let email = normalize_email(email)?;
    let id: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    id.as_deref().map(uuid_utils::from_db).transpose()
}

/// `from + ttl_seconds`, refusing lifetimes beyond [`MAX_TTL_SECONDS`]
fn expiry_after(from: DateTime<Utc>, ttl_seconds: i64) -> Result<DateTime<Utc>> {
    if ttl_seconds.unsigned_abs() > MAX_TTL_SECONDS as u64 {
        return Err(Error::Config(format!("token lifetime {}s out of range", ttl_seconds)));
    }
    Duration::try_seconds(ttl_seconds)
        .and_then(|ttl| from.checked_add_signed(ttl))
        .ok_or_else(|| Error::Config(format!("token lifetime {}s out of range", ttl_seconds)))
}

async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
    let token = random_hex(TOKEN_BYTES);
    let now = time::now();
    let expires_at = expiry_after(now, ttl_seconds)?;

    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(user_id.to_string())
        .bind(time::to_db(&now))
        .bind(time::to_db(&expires_at))
        .execute(pool)
        .await?;

    Ok(token)
}

/// Verify credentials and open a session
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn sign_in(pool: &SqlitePool, email: &str, password: &str, ttl_seconds: i64) -> Result<String> {
    let email = normalize_email(email).map_err(|_| Error::Unauthenticated)?;

    let row = sqlx::query("SELECT id, password_hash, password_salt FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        debug!("Sign-in for unknown email {}", email);
        return Err(Error::Unauthenticated);
    };

    let hash: String = row.get("password_hash");
    let salt: String = row.get("password_salt");
    if !verify_password(&salt, password, &hash) {
        warn!("Failed sign-in for {}", email);
        return Err(Error::Unauthenticated);
    }

    let user_id = uuid_utils::from_db(row.get("id"))?;
    let token = create_session(pool, user_id, ttl_seconds).await?;
    info!("User {} signed in", user_id);
    Ok(token)
}

/// Map a bearer token to its user, if the session exists and has not expired
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<Uuid>> {
    let user_id: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM sessions WHERE token = ? AND expires_at > ?")
            .bind(token)
            .bind(time::to_db(&time::now()))
            .fetch_optional(pool)
            .await?;

    user_id.as_deref().map(uuid_utils::from_db).transpose()
}

/// End a session; signing out twice is not an error
pub async fn sign_out(pool: &SqlitePool, token: &str) -> Result<()> {
    let removed = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?
        .rows_affected();

    if removed > 0 {
        debug!("Session closed");
    }
    Ok(())
}

/// Issue a one-time password reset token
///
/// Returns `None` for an unknown email so callers can answer identically in
/// both cases. Delivery of the token is out of scope; it is logged.
pub async fn request_password_reset(pool: &SqlitePool, email: &str, ttl_seconds: i64) -> Result<Option<String>> {
    let Some(user_id) = find_user_id(pool, email).await? else {
        debug!("Password reset requested for unknown email");
        return Ok(None);
    };

    let expires_at = expiry_after(time::now(), ttl_seconds)?;
    let token = random_hex(TOKEN_BYTES);
    sqlx::query("INSERT INTO password_resets (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id.to_string())
        .bind(time::to_db(&expires_at))
        .execute(pool)
        .await?;

    info!("Password reset token for user {}: {}", user_id, token);
    Ok(Some(token))
}

/// Consume a reset token, set the new password and revoke existing sessions
pub async fn reset_password(pool: &SqlitePool, token: &str, new_password: &str) -> Result<()> {
    validate_password(new_password)?;

    let mut tx = pool.begin().await?;

    let user_id: Option<String> = sqlx::query_scalar(
        "DELETE FROM password_resets WHERE token = ? AND expires_at > ? RETURNING user_id",
    )
    .bind(token)
    .bind(time::to_db(&time::now()))
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user_id) = user_id else {
        return Err(Error::InvalidInput("reset token is invalid or expired".to_string()));
    };

    let salt = random_hex(SALT_BYTES);
    sqlx::query("UPDATE users SET password_hash = ?, password_salt = ? WHERE id = ?")
        .bind(hash_password(&salt, new_password))
        .bind(&salt)
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!("Password reset for user {}", user_id);
    Ok(())
}
