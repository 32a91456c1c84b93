//! Activity entity (hours logged against one activity on one day).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    /// Activity name, unique per user and day
    pub name: String,

    /// Predefined tile key or custom tile UUID
    #[sea_orm(nullable)]
    pub tile_id: Option<String>,

    /// Hours in `[0, 24]`
    #[sea_orm(column_type = "Double")]
    pub duration_hours: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,

    /// Calendar day in the user's timezone
    pub date: Date,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
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

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
