//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub username: String,

    /// Lowercased username for case-insensitive lookup
    #[sea_orm(unique)]
    pub username_lower: String,

    /// Address for reminder emails
    #[sea_orm(nullable)]
    pub email: Option<String>,

    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Bearer token of the current session
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    #[sea_orm(nullable)]
    pub display_name: Option<String>,

    /// IANA timezone name, e.g. `Europe/Berlin`
    pub timezone: String,

    /// Follow requests to a private user stay pending until accepted
    #[sea_orm(default_value = false)]
    pub is_private: bool,

    /// Opt-in for the evening reminder
    #[sea_orm(default_value = true)]
    pub reminder_enabled: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity::Entity")]
    Activities,

    #[sea_orm(has_one = "super::streak::Entity")]
    Streak,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activities.def()
    }
}

impl Related<super::streak::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Streak.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
