//! Create summary_like table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SummaryLike::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SummaryLike::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SummaryLike::LikerId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(SummaryLike::LikedUserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SummaryLike::Date).date().not_null())
                    .col(ColumnDef::new(SummaryLike::Reaction).string_len(16))
                    .col(
                        ColumnDef::new(SummaryLike::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_summary_like_liker")
                            .from(SummaryLike::Table, SummaryLike::LikerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_summary_like_liked_user")
                            .from(SummaryLike::Table, SummaryLike::LikedUserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one like per liker, summary owner and day
        manager
            .create_index(
                Index::create()
                    .name("idx_summary_like_unique")
                    .table(SummaryLike::Table)
                    .col(SummaryLike::LikerId)
                    .col(SummaryLike::LikedUserId)
                    .col(SummaryLike::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (liked_user_id, date) for like counts on a summary
        manager
            .create_index(
                Index::create()
                    .name("idx_summary_like_liked_user_date")
                    .table(SummaryLike::Table)
                    .col(SummaryLike::LikedUserId)
                    .col(SummaryLike::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SummaryLike::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SummaryLike {
    Table,
    Id,
    LikerId,
    LikedUserId,
    Date,
    Reaction,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
