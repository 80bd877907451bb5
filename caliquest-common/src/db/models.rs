//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progression::Sequenced;

/// Per-user profile
///
/// `is_admin` is granted out of band by an operator; `onboarding_completed`
/// is set once by the profile-setup flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub age: Option<i64>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub onboarding_completed: bool,
}

/// Top-level themed region containing levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Ordered stage within a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: Uuid,
    pub map_id: Uuid,
    pub name: String,
    pub description: String,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Video-guided drill inside a level (never gated on its own)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    pub level_id: Uuid,
    pub name: String,
    pub description: String,
    pub video_url: Option<String>,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Kind of unit a completion record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Map,
    Level,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Map => "map",
            UnitKind::Level => "level",
        }
    }
}

/// Durable fact that a user finished a map or level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub user_id: Uuid,
    pub unit_kind: UnitKind,
    pub unit_id: Uuid,
    /// Map that owns the unit (equal to `unit_id` for map completions)
    pub map_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Input for creating a map
#[derive(Debug, Clone, Deserialize)]
pub struct NewMap {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order_index: i64,
}

/// Input for creating a level
#[derive(Debug, Clone, Deserialize)]
pub struct NewLevel {
    pub map_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order_index: i64,
}

/// Input for creating an exercise
#[derive(Debug, Clone, Deserialize)]
pub struct NewExercise {
    pub level_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub order_index: i64,
}

/// Input for the one-time profile setup
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSetup {
    pub username: String,
    pub age: i64,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Sequenced for Map {
    fn unit_id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i64 {
        self.order_index
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Sequenced for Level {
    fn unit_id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i64 {
        self.order_index
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Sequenced for Exercise {
    fn unit_id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i64 {
        self.order_index
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
