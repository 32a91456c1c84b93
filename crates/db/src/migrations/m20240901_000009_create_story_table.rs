//! Create story table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Story::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Story::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Story::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Story::ActivityId).string_len(32).not_null())
                    .col(ColumnDef::new(Story::ActivityName).string_len(64).not_null())
                    .col(ColumnDef::new(Story::Date).date().not_null())
                    .col(ColumnDef::new(Story::StorageKey).string_len(256).not_null())
                    .col(ColumnDef::new(Story::ThumbnailKey).string_len(256).not_null())
                    .col(ColumnDef::new(Story::Url).string_len(512).not_null())
                    .col(ColumnDef::new(Story::ThumbnailUrl).string_len(512).not_null())
                    .col(ColumnDef::new(Story::ContentType).string_len(32).not_null())
                    .col(ColumnDef::new(Story::Width).integer().not_null())
                    .col(ColumnDef::new(Story::Height).integer().not_null())
                    .col(ColumnDef::new(Story::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(Story::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Story::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_user")
                            .from(Story::Table, Story::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_activity")
                            .from(Story::Table, Story::ActivityId)
                            .to(Activity::Table, Activity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one story per activity
        manager
            .create_index(
                Index::create()
                    .name("idx_story_user_activity")
                    .table(Story::Table)
                    .col(Story::UserId)
                    .col(Story::ActivityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: expires_at for the cleanup job
        manager
            .create_index(
                Index::create()
                    .name("idx_story_expires_at")
                    .table(Story::Table)
                    .col(Story::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Story::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Story {
    Table,
    Id,
    UserId,
    ActivityId,
    ActivityName,
    Date,
    StorageKey,
    ThumbnailKey,
    Url,
    ThumbnailUrl,
    ContentType,
    Width,
    Height,
    Size,
    CreatedAt,
    ExpiresAt,
}

#[derive(Iden)]
enum Activity {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
