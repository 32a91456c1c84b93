//! Create push_subscription, push_preference and push_delivery_log tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PushSubscription::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PushSubscription::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PushSubscription::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PushSubscription::Endpoint)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PushSubscription::P256dh)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PushSubscription::Auth)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PushSubscription::UserAgent).string_len(512))
                    .col(
                        ColumnDef::new(PushSubscription::FailureCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PushSubscription::LastFailureAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PushSubscription::LastSuccessAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PushSubscription::DisabledAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(PushSubscription::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_push_subscription_user")
                            .from(PushSubscription::Table, PushSubscription::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_push_subscription_user_id")
                    .table(PushSubscription::Table)
                    .col(PushSubscription::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PushPreference::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PushPreference::UserId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PushPreference::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(PushPreference::QuietHoursStart).string_len(5))
                    .col(ColumnDef::new(PushPreference::QuietHoursEnd).string_len(5))
                    .col(
                        ColumnDef::new(PushPreference::DisabledKinds)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(PushPreference::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_push_preference_user")
                            .from(PushPreference::Table, PushPreference::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PushDeliveryLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PushDeliveryLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PushDeliveryLog::MessageId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PushDeliveryLog::SubscriptionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PushDeliveryLog::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PushDeliveryLog::NotificationId).string_len(32))
                    .col(
                        ColumnDef::new(PushDeliveryLog::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PushDeliveryLog::HttpStatus).integer())
                    .col(ColumnDef::new(PushDeliveryLog::Error).text())
                    .col(
                        ColumnDef::new(PushDeliveryLog::Attempt)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(PushDeliveryLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_push_delivery_log_user_created_at")
                    .table(PushDeliveryLog::Table)
                    .col(PushDeliveryLog::UserId)
                    .col(PushDeliveryLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PushDeliveryLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PushPreference::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PushSubscription::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PushSubscription {
    Table,
    Id,
    UserId,
    Endpoint,
    P256dh,
    Auth,
    UserAgent,
    FailureCount,
    LastFailureAt,
    LastSuccessAt,
    DisabledAt,
    CreatedAt,
}

#[derive(Iden)]
enum PushPreference {
    Table,
    UserId,
    Enabled,
    QuietHoursStart,
    QuietHoursEnd,
    DisabledKinds,
    UpdatedAt,
}

#[derive(Iden)]
enum PushDeliveryLog {
    Table,
    Id,
    MessageId,
    SubscriptionId,
    UserId,
    NotificationId,
    Status,
    HttpStatus,
    Error,
    Attempt,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
