//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p habitgrid-db --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `habitgrid_test`)
//!   `TEST_DB_PASSWORD` (default: `habitgrid_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use habitgrid_common::AppError;
use habitgrid_db::{
    entities::{
        follow_edge_by_follower::FollowState, notification, notification::NotificationKind,
        notification_dedupe, summary_like,
    },
    repositories::{
        CronJobLogRepository, FollowRepository, LikeRepository, NotificationRepository,
    },
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::Set;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_cron_lock_is_exclusive_per_day() {
    let db = TestDatabase::create_unique().await.expect("create db");
    let repo = CronJobLogRepository::new(Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap()));

    assert!(repo.try_insert_running("r1".into(), "streak_rollover", day()).await.unwrap());
    assert!(!repo.try_insert_running("r2".into(), "streak_rollover", day()).await.unwrap());
    assert!(repo.try_insert_running("r3".into(), "reminder_emails", day()).await.unwrap());

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_like_is_conflict() {
    let db = TestDatabase::create_unique().await.expect("create db");
    db.insert_user("ua", "alice").await.unwrap();
    db.insert_user("ub", "bob").await.unwrap();
    let repo = LikeRepository::new(Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap()));

    let like = |id: &str| summary_like::ActiveModel {
        id: Set(id.to_string()),
        liker_id: Set("ua".to_string()),
        liked_user_id: Set("ub".to_string()),
        date: Set(day()),
        reaction: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
    };

    repo.create(like("l1")).await.unwrap();
    let second = repo.create(like("l2")).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_notification_dedupe_claim() {
    let db = TestDatabase::create_unique().await.expect("create db");
    db.insert_user("ua", "alice").await.unwrap();
    db.insert_user("ub", "bob").await.unwrap();
    let repo = NotificationRepository::new(Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap()));

    let attempt = |id: &str| {
        let now = Utc::now().fixed_offset();
        (
            notification_dedupe::ActiveModel {
                user_id: Set("ub".to_string()),
                actor_id: Set("ua".to_string()),
                kind: Set("like".to_string()),
                entity_type: Set("summary".to_string()),
                entity_key: Set("2024-05-01".to_string()),
                notification_id: Set(id.to_string()),
                created_at: Set(now),
            },
            notification::ActiveModel {
                id: Set(id.to_string()),
                user_id: Set("ub".to_string()),
                actor_id: Set(Some("ua".to_string())),
                kind: Set(NotificationKind::Like),
                entity_type: Set("summary".to_string()),
                entity_key: Set("2024-05-01".to_string()),
                metadata: Set(serde_json::json!({"kind": "like", "date": "2024-05-01"})),
                is_read: Set(false),
                created_at: Set(now),
            },
        )
    };

    let (claim, model) = attempt("n1");
    assert!(repo.create_deduped(claim, model).await.unwrap().is_some());
    let (claim, model) = attempt("n2");
    assert!(repo.create_deduped(claim, model).await.unwrap().is_none());
    assert_eq!(repo.count_unread("ub").await.unwrap(), 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_edges_agree() {
    let db = TestDatabase::create_unique().await.expect("create db");
    db.insert_user("ua", "alice").await.unwrap();
    db.insert_user("ub", "bob").await.unwrap();
    let repo = FollowRepository::new(Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap()));

    repo.transition("ua", "ub", |_| Ok(FollowState::Pending)).await.unwrap();
    repo.transition("ua", "ub", |_| Ok(FollowState::Active)).await.unwrap();

    let outgoing = repo.find_following("ua", FollowState::Active, 10, None).await.unwrap();
    let incoming = repo.find_followers("ub", FollowState::Active, 10, None).await.unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].follower_id, "ua");

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(config.database_url().starts_with("postgres://"));
}
