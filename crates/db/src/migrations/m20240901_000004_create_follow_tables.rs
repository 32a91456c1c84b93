//! Create the two follow edge tables and the follow counter.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FollowEdgeByFollower::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowEdgeByFollower::FollowerId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollower::FolloweeId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollower::State)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollower::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollower::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(FollowEdgeByFollower::FollowerId)
                            .col(FollowEdgeByFollower::FolloweeId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_by_follower_follower")
                            .from(FollowEdgeByFollower::Table, FollowEdgeByFollower::FollowerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_by_follower_followee")
                            .from(FollowEdgeByFollower::Table, FollowEdgeByFollower::FolloweeId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (follower_id, state) for listing who a user follows
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_by_follower_state")
                    .table(FollowEdgeByFollower::Table)
                    .col(FollowEdgeByFollower::FollowerId)
                    .col(FollowEdgeByFollower::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FollowEdgeByFollowee::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowEdgeByFollowee::FolloweeId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollowee::FollowerId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollowee::State)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollowee::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FollowEdgeByFollowee::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(FollowEdgeByFollowee::FolloweeId)
                            .col(FollowEdgeByFollowee::FollowerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_by_followee_followee")
                            .from(FollowEdgeByFollowee::Table, FollowEdgeByFollowee::FolloweeId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_by_followee_follower")
                            .from(FollowEdgeByFollowee::Table, FollowEdgeByFollowee::FollowerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (followee_id, state) for listing followers and requests
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_by_followee_state")
                    .table(FollowEdgeByFollowee::Table)
                    .col(FollowEdgeByFollowee::FolloweeId)
                    .col(FollowEdgeByFollowee::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FollowCounter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowCounter::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FollowCounter::FollowersCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FollowCounter::FollowingCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FollowCounter::PendingCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FollowCounter::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_counter_user")
                            .from(FollowCounter::Table, FollowCounter::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowCounter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FollowEdgeByFollowee::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FollowEdgeByFollower::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FollowEdgeByFollower {
    Table,
    FollowerId,
    FolloweeId,
    State,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum FollowEdgeByFollowee {
    Table,
    FolloweeId,
    FollowerId,
    State,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum FollowCounter {
    Table,
    UserId,
    FollowersCount,
    FollowingCount,
    PendingCount,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
