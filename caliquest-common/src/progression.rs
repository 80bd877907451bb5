//! Progression engine
//!
//! Linear unlock gating over an ordered sibling sequence (maps, or the levels
//! of one map). Per user and unit the state moves `Locked -> Unlocked ->
//! Completed`:
//!
//! - `Locked -> Unlocked` is never stored; it is derived on every read from
//!   the completion of the immediate predecessor.
//! - `Unlocked -> Completed` is the only persisted transition (a completion
//!   record) and is one-way.
//!
//! [`compute_accessibility`] is pure and synchronous. Recording completions is
//! done through [`crate::db::completions::record_completion`], which reports a
//! [`CompletionOutcome`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::db::models::CompletionRecord;

/// A unit that takes part in a sibling ordering
pub trait Sequenced {
    fn unit_id(&self) -> Uuid;
    fn order_index(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Accessibility of one unit for the current user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Accessibility {
    pub unlocked: bool,
    pub completed: bool,
}

/// Derived per-unit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Locked,
    Unlocked,
    Completed,
}

impl Accessibility {
    /// Collapse into a single state. Completion is never revoked, so a
    /// completed unit reports `Completed` even if its predecessor is not.
    pub fn state(&self) -> UnitState {
        if self.completed {
            UnitState::Completed
        } else if self.unlocked {
            UnitState::Unlocked
        } else {
            UnitState::Locked
        }
    }
}

/// Compute accessibility for every unit of an already-sorted sibling sequence
///
/// Position 0 is always unlocked; position `i > 0` is unlocked iff
/// `completed_ids` contains the id at position `i - 1`. `completed` is plain
/// membership of the unit's own id. The input is not re-sorted; the
/// `crate::db::units` listings already return siblings in order.
pub fn compute_accessibility<U: Sequenced>(
    siblings: &[U],
    completed_ids: &HashSet<Uuid>,
) -> HashMap<Uuid, Accessibility> {
    let mut result = HashMap::with_capacity(siblings.len());
    let mut predecessor: Option<Uuid> = None;

    for unit in siblings {
        let id = unit.unit_id();
        let unlocked = match predecessor {
            None => true,
            Some(prev) => completed_ids.contains(&prev),
        };
        result.insert(
            id,
            Accessibility {
                unlocked,
                completed: completed_ids.contains(&id),
            },
        );
        predecessor = Some(id);
    }

    result
}

/// Accessibility of a single unit within its siblings, `None` if absent
pub fn accessibility_of<U: Sequenced>(
    siblings: &[U],
    completed_ids: &HashSet<Uuid>,
    unit_id: Uuid,
) -> Option<Accessibility> {
    let position = siblings.iter().position(|u| u.unit_id() == unit_id)?;
    let unlocked = position == 0 || completed_ids.contains(&siblings[position - 1].unit_id());
    Some(Accessibility {
        unlocked,
        completed: completed_ids.contains(&unit_id),
    })
}

/// Result of recording a completion
///
/// `AlreadyCompleted` is a success: the record existed before the call and
/// nothing was written.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Recorded(CompletionRecord),
    AlreadyCompleted(CompletionRecord),
}

impl CompletionOutcome {
    pub fn record(&self) -> &CompletionRecord {
        match self {
            CompletionOutcome::Recorded(r) | CompletionOutcome::AlreadyCompleted(r) => r,
        }
    }

    pub fn is_newly_recorded(&self) -> bool {
        matches!(self, CompletionOutcome::Recorded(_))
    }
}
