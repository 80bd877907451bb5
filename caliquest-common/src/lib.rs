//! # CaliQuest Common Library
//!
//! Shared code for the CaliQuest service including:
//! - Database schema, migrations and typed queries
//! - The progression engine (map/level unlock gating)
//! - Session context and access gating
//! - Account and session-token management
//! - Blob storage for instructional video
//! - Configuration loading

pub mod api;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod progress;
pub mod progression;
pub mod session;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use progression::{compute_accessibility, Accessibility, CompletionOutcome, UnitState};
pub use session::SessionContext;
