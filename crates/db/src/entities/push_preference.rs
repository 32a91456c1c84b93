//! Per-user push preferences.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "push_preference")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    #[sea_orm(default_value = true)]
    pub enabled: bool,

    /// `HH:MM` in the user's timezone
    #[sea_orm(nullable)]
    pub quiet_hours_start: Option<String>,

    /// `HH:MM` in the user's timezone, exclusive
    #[sea_orm(nullable)]
    pub quiet_hours_end: Option<String>,

    /// Notification kinds the user opted out of (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub disabled_kinds: Json,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}
