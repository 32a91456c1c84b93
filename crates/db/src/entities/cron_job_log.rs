//! Daily job run log; the unique (job_name, job_date) row is the run lock.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CronStatus {
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cron_job_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub job_name: String,

    /// Run date (UTC)
    pub job_date: Date,

    pub status: CronStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub detail: Option<String>,

    pub started_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub finished_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
