//! Follow edge keyed by the followee (incoming side).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::follow_edge_by_follower::FollowState;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow_edge_by_followee")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub followee_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub follower_id: String,

    pub state: FollowState,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FolloweeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Followee,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FollowerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,
}

impl ActiveModelBehavior for ActiveModel {}
