//! Create streak table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Streak::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Streak::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Streak::CurrentStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Streak::LongestStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Streak::LastActiveDate).date())
                    .col(
                        ColumnDef::new(Streak::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_streak_user")
                            .from(Streak::Table, Streak::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: last_active_date for the nightly rollover
        manager
            .create_index(
                Index::create()
                    .name("idx_streak_last_active_date")
                    .table(Streak::Table)
                    .col(Streak::LastActiveDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Streak::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Streak {
    Table,
    UserId,
    CurrentStreak,
    LongestStreak,
    LastActiveDate,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
