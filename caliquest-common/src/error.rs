//! Common error types for CaliQuest

use thiserror::Error;

/// Common result type for CaliQuest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across CaliQuest crates
///
/// An already-existing completion is not an error; see
/// [`crate::progression::CompletionOutcome::AlreadyCompleted`].
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (connectivity, constraint, decode)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A relation the service depends on does not exist
    #[error("Database schema not initialized: {0}")]
    SchemaMissing(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unique value already taken (email, username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No active session
    #[error("Authentication required")]
    Unauthenticated,

    /// Session is valid but lacks the required privilege
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Profile setup has not been completed yet
    #[error("Profile setup required")]
    OnboardingRequired,

    /// Profile setup was already completed
    #[error("Profile setup already completed")]
    AlreadyOnboarded,

    /// Unit is not reachable yet (predecessor not completed)
    #[error("Locked: {0}")]
    Locked(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let message = db_err.message();
            if message.contains("no such table") {
                return Error::SchemaMissing(message.to_string());
            }
        }
        Error::Database(err)
    }
}

/// True when the error is a UNIQUE / PRIMARY KEY constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
