//! Denormalized follow counts, recounted in the background.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow_counter")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// ACTIVE incoming edges
    #[sea_orm(default_value = 0)]
    pub followers_count: i64,

    /// ACTIVE outgoing edges
    #[sea_orm(default_value = 0)]
    pub following_count: i64,

    /// PENDING incoming edges
    #[sea_orm(default_value = 0)]
    pub pending_count: i64,

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
