//! Story entity (a photo attached to one activity, visible for 24 hours).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "story")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    /// At most one story per activity
    pub activity_id: String,

    pub activity_name: String,

    /// Day of the activity
    pub date: Date,

    pub storage_key: String,

    pub thumbnail_key: String,

    pub url: String,

    pub thumbnail_url: String,

    /// Sniffed MIME type of the original
    pub content_type: String,

    pub width: i32,

    pub height: i32,

    /// Original size in bytes
    pub size: i64,

    pub created_at: DateTimeWithTimeZone,

    pub expires_at: DateTimeWithTimeZone,
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

    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id",
        on_delete = "Cascade"
    )]
    Activity,
}

impl ActiveModelBehavior for ActiveModel {}
