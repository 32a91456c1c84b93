//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20240901_000001_create_user_table;
mod m20240901_000002_create_activity_table;
mod m20240901_000003_create_tile_tables;
mod m20240901_000004_create_follow_tables;
mod m20240901_000005_create_streak_table;
mod m20240901_000006_create_summary_like_table;
mod m20240901_000007_create_notification_tables;
mod m20240901_000008_create_push_tables;
mod m20240901_000009_create_story_table;
mod m20240901_000010_create_cron_job_log_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240901_000001_create_user_table::Migration),
            Box::new(m20240901_000002_create_activity_table::Migration),
            Box::new(m20240901_000003_create_tile_tables::Migration),
            Box::new(m20240901_000004_create_follow_tables::Migration),
            Box::new(m20240901_000005_create_streak_table::Migration),
            Box::new(m20240901_000006_create_summary_like_table::Migration),
            Box::new(m20240901_000007_create_notification_tables::Migration),
            Box::new(m20240901_000008_create_push_tables::Migration),
            Box::new(m20240901_000009_create_story_table::Migration),
            Box::new(m20240901_000010_create_cron_job_log_table::Migration),
        ]
    }
}
