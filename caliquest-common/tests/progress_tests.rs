//! Progression against a real database: completion recording, roll-up,
//! gating and cascade behavior

use caliquest_common::api::auth::sign_up;
use caliquest_common::db::completions::{self, CompletionTarget};
use caliquest_common::db::units::{self, EntityKind};
use caliquest_common::db::{init_database, init_memory_database, Level, Map, NewLevel, NewMap};
use caliquest_common::progress::{self, MapCompletionRule, ProgressPolicy};
use caliquest_common::{Error, UnitState};
use sqlx::SqlitePool;
use uuid::Uuid;

const STRICT: ProgressPolicy = ProgressPolicy {
    enforce_unlock: true,
    map_completion: MapCompletionRule::FirstLevel,
};
const PERMISSIVE: ProgressPolicy = ProgressPolicy {
    enforce_unlock: false,
    map_completion: MapCompletionRule::FirstLevel,
};
const ALL_LEVELS: ProgressPolicy = ProgressPolicy {
    enforce_unlock: true,
    map_completion: MapCompletionRule::AllLevels,
};

async fn user(pool: &SqlitePool, name: &str) -> Uuid {
    sign_up(pool, &format!("{}@example.com", name), "password1")
        .await
        .unwrap()
}

async fn map(pool: &SqlitePool, name: &str, order_index: i64) -> Map {
    units::insert_map(
        pool,
        NewMap {
            name: name.to_string(),
            description: String::new(),
            order_index,
        },
    )
    .await
    .unwrap()
}

async fn level(pool: &SqlitePool, map_id: Uuid, name: &str, order_index: i64) -> Level {
    units::insert_level(
        pool,
        NewLevel {
            map_id,
            name: name.to_string(),
            description: String::new(),
            order_index,
        },
    )
    .await
    .unwrap()
}

/// One map with levels A, B, C in order
async fn abc(pool: &SqlitePool) -> (Map, Level, Level, Level) {
    let m = map(pool, "Foundations", 0).await;
    let a = level(pool, m.id, "A", 0).await;
    let b = level(pool, m.id, "B", 1).await;
    let c = level(pool, m.id, "C", 2).await;
    (m, a, b, c)
}

fn states(detail: &progress::MapDetail) -> Vec<UnitState> {
    detail.levels.iter().map(|l| l.state).collect()
}

#[tokio::test]
async fn test_abc_scenarios() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (m, a, b, _c) = abc(&pool).await;

    // Nothing completed: only A is open
    let detail = progress::map_detail(&pool, uid, m.id, STRICT).await.unwrap();
    assert_eq!(
        states(&detail),
        vec![UnitState::Unlocked, UnitState::Locked, UnitState::Locked]
    );

    // A completed: B opens
    progress::complete_level(&pool, uid, a.id, STRICT).await.unwrap();
    let detail = progress::map_detail(&pool, uid, m.id, STRICT).await.unwrap();
    assert_eq!(
        states(&detail),
        vec![UnitState::Completed, UnitState::Unlocked, UnitState::Locked]
    );

    // A and B completed: C opens
    progress::complete_level(&pool, uid, b.id, STRICT).await.unwrap();
    let detail = progress::map_detail(&pool, uid, m.id, STRICT).await.unwrap();
    assert_eq!(
        states(&detail),
        vec![UnitState::Completed, UnitState::Completed, UnitState::Unlocked]
    );
}

#[tokio::test]
async fn test_completion_is_idempotent() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (_m, a, _b, _c) = abc(&pool).await;

    let first = progress::complete_level(&pool, uid, a.id, STRICT).await.unwrap();
    let second = progress::complete_level(&pool, uid, a.id, STRICT).await.unwrap();

    assert!(first.level.is_newly_recorded());
    assert!(!second.level.is_newly_recorded());
    assert_eq!(first.level.record(), second.level.record());
    assert_eq!(completions::list_completions(&pool, uid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_locked_level_rejected_when_enforced() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (_m, _a, b, c) = abc(&pool).await;

    let err = progress::complete_level(&pool, uid, c.id, STRICT).await.unwrap_err();
    assert!(matches!(err, Error::Locked(_)));

    let err = progress::level_detail(&pool, uid, b.id, STRICT).await.unwrap_err();
    assert!(matches!(err, Error::Locked(_)));

    assert!(completions::list_completions(&pool, uid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_permissive_mode_allows_skipping() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (m, _a, _b, c) = abc(&pool).await;

    let outcome = progress::complete_level(&pool, uid, c.id, PERMISSIVE).await.unwrap();
    assert!(outcome.level.is_newly_recorded());

    // C is completed even though its predecessor is not
    let detail = progress::map_detail(&pool, uid, m.id, PERMISSIVE).await.unwrap();
    assert_eq!(
        states(&detail),
        vec![UnitState::Unlocked, UnitState::Locked, UnitState::Completed]
    );
}

#[tokio::test]
async fn test_first_level_completes_map_and_unlocks_next() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let m = map(&pool, "Foundations", 0).await;
    let l0 = level(&pool, m.id, "L0", 0).await;
    let l1 = level(&pool, m.id, "L1", 1).await;
    let next = map(&pool, "Strength", 1).await;

    let overview = progress::map_overview(&pool, uid).await.unwrap();
    assert_eq!(overview[1].unit.id, next.id);
    assert_eq!(overview[1].state, UnitState::Locked);

    let first = progress::complete_level(&pool, uid, l0.id, STRICT).await.unwrap();
    assert!(first.map_newly_completed());
    assert_eq!(first.map.as_ref().unwrap().record().unit_id, m.id);

    let overview = progress::map_overview(&pool, uid).await.unwrap();
    assert_eq!(overview[0].state, UnitState::Completed);
    assert_eq!(overview[1].state, UnitState::Unlocked);

    // Later levels of the same map keep the existing map record
    let second = progress::complete_level(&pool, uid, l1.id, STRICT).await.unwrap();
    assert!(second.level.is_newly_recorded());
    assert!(second.map.is_some());
    assert!(!second.map_newly_completed());
    assert_eq!(
        second.map.as_ref().unwrap().record(),
        first.map.as_ref().unwrap().record()
    );
}

#[tokio::test]
async fn test_all_levels_rule_completes_map_after_last_level() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (m, a, b, c) = abc(&pool).await;
    let next = map(&pool, "Strength", 1).await;

    for lvl in [&a, &b] {
        let done = progress::complete_level(&pool, uid, lvl.id, ALL_LEVELS).await.unwrap();
        assert!(done.map.is_none());
    }

    let overview = progress::map_overview(&pool, uid).await.unwrap();
    assert_eq!(overview[1].unit.id, next.id);
    assert_eq!(overview[1].state, UnitState::Locked);

    let last = progress::complete_level(&pool, uid, c.id, ALL_LEVELS).await.unwrap();
    assert!(last.map_newly_completed());
    assert_eq!(last.map.as_ref().unwrap().record().unit_id, m.id);

    let overview = progress::map_overview(&pool, uid).await.unwrap();
    assert_eq!(overview[0].state, UnitState::Completed);
    assert_eq!(overview[1].state, UnitState::Unlocked);

    // Replaying the last level does not re-complete the map
    let replay = progress::complete_level(&pool, uid, c.id, ALL_LEVELS).await.unwrap();
    assert!(!replay.map_newly_completed());
    assert!(replay.map.is_some());
}

#[tokio::test]
async fn test_locked_map_cannot_be_entered() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let _first = abc(&pool).await;
    let second = map(&pool, "Strength", 1).await;
    let first_of_second = level(&pool, second.id, "Pull-up", 0).await;

    let err = progress::map_detail(&pool, uid, second.id, STRICT).await.unwrap_err();
    assert!(matches!(err, Error::Locked(_)));

    let err = progress::complete_level(&pool, uid, first_of_second.id, STRICT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Locked(_)));
}

#[tokio::test]
async fn test_progress_is_per_user() {
    let pool = init_memory_database().await.unwrap();
    let kim = user(&pool, "kim").await;
    let lee = user(&pool, "lee").await;
    let (m, a, _b, _c) = abc(&pool).await;

    progress::complete_level(&pool, kim, a.id, STRICT).await.unwrap();

    let detail = progress::map_detail(&pool, lee, m.id, STRICT).await.unwrap();
    assert_eq!(
        states(&detail),
        vec![UnitState::Unlocked, UnitState::Locked, UnitState::Locked]
    );
}

#[tokio::test]
async fn test_missing_level_is_not_found() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;

    let err = progress::complete_level(&pool, uid, Uuid::new_v4(), STRICT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_deleting_map_cascades_to_completions() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (m, a, b, c) = abc(&pool).await;
    for lvl in [&a, &b, &c] {
        progress::complete_level(&pool, uid, lvl.id, STRICT).await.unwrap();
    }
    assert_eq!(completions::list_completions(&pool, uid).await.unwrap().len(), 4);

    EntityKind::Map.delete(&pool, m.id).await.unwrap();

    assert!(completions::list_completions(&pool, uid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_level_removes_only_its_completion() {
    let pool = init_memory_database().await.unwrap();
    let uid = user(&pool, "kim").await;
    let (m, a, b, _c) = abc(&pool).await;
    progress::complete_level(&pool, uid, a.id, STRICT).await.unwrap();
    progress::complete_level(&pool, uid, b.id, STRICT).await.unwrap();

    EntityKind::Level.delete(&pool, b.id).await.unwrap();

    let done = completions::completed_level_ids(&pool, uid, m.id).await.unwrap();
    assert!(done.contains(&a.id));
    assert!(!done.contains(&b.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_completion_yields_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("race.db")).await.unwrap();
    let uid = user(&pool, "kim").await;
    let (m, a, _b, _c) = abc(&pool).await;
    let target = CompletionTarget::Level {
        level_id: a.id,
        map_id: m.id,
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { completions::record_completion(&pool, uid, target).await })
        })
        .collect();

    let mut recorded = 0;
    let mut already = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.is_newly_recorded() {
            recorded += 1;
        } else {
            already += 1;
        }
    }

    assert_eq!(recorded, 1);
    assert_eq!(already, 7);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM completions WHERE user_id = ?")
        .bind(uid.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
