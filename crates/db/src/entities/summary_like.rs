//! Like on a user's daily summary.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "summary_like")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who liked
    pub liker_id: String,

    /// Owner of the liked summary
    pub liked_user_id: String,

    /// Day of the liked summary
    pub date: Date,

    /// Optional single-emoji reaction
    #[sea_orm(nullable)]
    pub reaction: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::LikerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Liker,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::LikedUserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    LikedUser,
}

impl ActiveModelBehavior for ActiveModel {}
