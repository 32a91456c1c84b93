//! Push delivery log, one row per (notification, subscription) outcome.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "retryable")]
    Retryable,
    #[sea_orm(string_value = "gone")]
    Gone,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "skipped_quiet_hours")]
    SkippedQuietHours,
    #[sea_orm(string_value = "skipped_opt_out")]
    SkippedOptOut,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "push_delivery_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// `hex(sha256(notification_id ":" subscription_id))`
    #[sea_orm(unique)]
    pub message_id: String,

    pub subscription_id: String,

    pub user_id: String,

    #[sea_orm(nullable)]
    pub notification_id: Option<String>,

    pub status: DeliveryStatus,

    #[sea_orm(nullable)]
    pub http_status: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    /// Attempts made, starting at 1
    pub attempt: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
