//! Create activity table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activity::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activity::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Activity::Name).string_len(64).not_null())
                    .col(ColumnDef::new(Activity::TileId).string_len(64))
                    .col(ColumnDef::new(Activity::DurationHours).double().not_null())
                    .col(ColumnDef::new(Activity::Note).text())
                    .col(ColumnDef::new(Activity::Date).date().not_null())
                    .col(
                        ColumnDef::new(Activity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Activity::UpdatedAt).timestamp_with_time_zone())
                    .check(
                        Expr::col(Activity::DurationHours)
                            .gte(0.0)
                            .and(Expr::col(Activity::DurationHours).lte(24.0)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_user")
                            .from(Activity::Table, Activity::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one row per user, activity name and day
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_user_name_date")
                    .table(Activity::Table)
                    .col(Activity::UserId)
                    .col(Activity::Name)
                    .col(Activity::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, date) for daily summaries and range listings
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_user_date")
                    .table(Activity::Table)
                    .col(Activity::UserId)
                    .col(Activity::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activity::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Activity {
    Table,
    Id,
    UserId,
    Name,
    TileId,
    DurationHours,
    Note,
    Date,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
