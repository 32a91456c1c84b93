//! Create cron_job_log table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CronJobLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CronJobLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CronJobLog::JobName).string_len(64).not_null())
                    .col(ColumnDef::new(CronJobLog::JobDate).date().not_null())
                    .col(ColumnDef::new(CronJobLog::Status).string_len(16).not_null())
                    .col(ColumnDef::new(CronJobLog::Detail).text())
                    .col(
                        ColumnDef::new(CronJobLog::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CronJobLog::FinishedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Unique index: the run lock, one row per job and day
        manager
            .create_index(
                Index::create()
                    .name("idx_cron_job_log_job_date")
                    .table(CronJobLog::Table)
                    .col(CronJobLog::JobName)
                    .col(CronJobLog::JobDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CronJobLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CronJobLog {
    Table,
    Id,
    JobName,
    JobDate,
    Status,
    Detail,
    StartedAt,
    FinishedAt,
}
