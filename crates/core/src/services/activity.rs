//! Activity logging: hours per activity per day.

use chrono::{Duration, NaiveDate, Utc};
use habitgrid_common::{AppError, AppResult, IdGenerator, local_date, parse_timezone};
use habitgrid_db::{
    entities::activity,
    repositories::{ActivityRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::streak::StreakService;
use crate::services::tile::TileService;

/// Hours in a day.
pub const HOURS_PER_DAY: f64 = 24.0;

/// Longest range `list_range` accepts, in days.
pub const MAX_RANGE_DAYS: i64 = 31;

const MAX_NAME_CHARS: usize = 64;

/// Slack for float sums such as 8.1 + 15.9.
const HOURS_EPSILON: f64 = 1e-9;

/// Input for saving an activity.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveActivityInput {
    pub name: String,
    pub tile_id: Option<String>,
    pub duration_hours: f64,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    pub date: NaiveDate,
}

/// Result of a save.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "activity", rename_all = "camelCase")]
pub enum SaveOutcome {
    Saved(activity::Model),
    /// Zero hours removed the row (or there was nothing to remove).
    Deleted,
}

/// Check hours are a finite number in `[0, 24]`.
pub fn validate_hours(hours: f64) -> AppResult<()> {
    if !hours.is_finite() || !(0.0..=HOURS_PER_DAY).contains(&hours) {
        return Err(AppError::Validation(format!(
            "duration must be between 0 and 24 hours, got {hours}"
        )));
    }
    Ok(())
}

/// Total hours for the day once `name` is set to `hours`.
///
/// Any existing row for the same name is replaced, not added to.
#[must_use]
pub fn day_total_with(existing: &[activity::Model], name: &str, hours: f64) -> f64 {
    existing
        .iter()
        .filter(|a| a.name != name)
        .map(|a| a.duration_hours)
        .sum::<f64>()
        + hours
}

/// Activity service for business logic.
#[derive(Clone)]
pub struct ActivityService {
    activity_repo: ActivityRepository,
    user_repo: UserRepository,
    tile_service: TileService,
    streak_service: StreakService,
    id_gen: IdGenerator,
}

impl ActivityService {
    /// Create a new activity service.
    #[must_use]
    pub const fn new(
        activity_repo: ActivityRepository,
        user_repo: UserRepository,
        tile_service: TileService,
        streak_service: StreakService,
    ) -> Self {
        Self {
            activity_repo,
            user_repo,
            tile_service,
            streak_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create, update or (with zero hours) delete the activity for a day.
    pub async fn save(&self, user_id: &str, input: SaveActivityInput) -> AppResult<SaveOutcome> {
        input.validate()?;
        validate_hours(input.duration_hours)?;

        let name = input.name.trim().to_string();
        let name_chars = name.chars().count();
        if name_chars == 0 || name_chars > MAX_NAME_CHARS {
            return Err(AppError::Validation(format!(
                "activity name must be 1 to {MAX_NAME_CHARS} characters"
            )));
        }

        let user = self.user_repo.get_by_id(user_id).await?;
        let today = local_date(parse_timezone(&user.timezone)?, Utc::now());
        if input.date > today + Duration::days(1) {
            return Err(AppError::Validation(format!(
                "cannot log activities for {}",
                input.date
            )));
        }

        let tile_id = match input.tile_id.as_deref() {
            Some(id) => Some(self.tile_service.resolve_tile_id(user_id, id).await?),
            None => None,
        };

        let day = self
            .activity_repo
            .find_by_user_date(user_id, input.date)
            .await?;
        let existing = day.iter().find(|a| a.name == name).cloned();

        if input.duration_hours == 0.0 {
            if let Some(row) = existing {
                self.activity_repo.delete(row).await?;
                tracing::debug!(user_id = %user_id, name = %name, date = %input.date, "Activity cleared");
            }
            return Ok(SaveOutcome::Deleted);
        }

        let total = day_total_with(&day, &name, input.duration_hours);
        if total > HOURS_PER_DAY + HOURS_EPSILON {
            return Err(AppError::Validation(format!(
                "{} already has {:.2} of 24 hours logged",
                input.date,
                total - input.duration_hours
            )));
        }

        let note = input.note.filter(|n| !n.trim().is_empty());
        let now = Utc::now().fixed_offset();

        let saved = match existing {
            Some(row) => {
                let mut active: activity::ActiveModel = row.into();
                active.duration_hours = Set(input.duration_hours);
                active.note = Set(note);
                active.tile_id = Set(tile_id);
                active.updated_at = Set(Some(now));
                self.activity_repo.update(active).await?
            }
            None => {
                self.activity_repo
                    .create(activity::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        user_id: Set(user_id.to_string()),
                        name: Set(name),
                        tile_id: Set(tile_id),
                        duration_hours: Set(input.duration_hours),
                        note: Set(note),
                        date: Set(input.date),
                        created_at: Set(now),
                        updated_at: Set(None),
                    })
                    .await?
            }
        };

        self.streak_service
            .record_activity(user_id, saved.date)
            .await?;

        Ok(SaveOutcome::Saved(saved))
    }

    /// Delete an activity by ID.
    pub async fn delete(&self, user_id: &str, activity_id: &str) -> AppResult<()> {
        let row = self
            .activity_repo
            .find_by_id(activity_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;
        self.activity_repo.delete(row).await
    }

    /// Get an activity owned by the user.
    pub async fn get_owned(&self, user_id: &str, activity_id: &str) -> AppResult<activity::Model> {
        self.activity_repo
            .find_by_id(activity_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
    }

    /// Activities of one day.
    pub async fn list_by_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<activity::Model>> {
        self.activity_repo.find_by_user_date(user_id, date).await
    }

    /// Activities in an inclusive date range of at most 31 days.
    pub async fn list_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<activity::Model>> {
        if to < from {
            return Err(AppError::BadRequest("range ends before it starts".to_string()));
        }
        if (to - from).num_days() >= MAX_RANGE_DAYS {
            return Err(AppError::BadRequest(format!(
                "range may cover at most {MAX_RANGE_DAYS} days"
            )));
        }
        self.activity_repo.find_by_user_range(user_id, from, to).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use habitgrid_db::{
        entities::{custom_tile, streak, user},
        repositories::{StreakRepository, TileRepository},
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn test_user() -> user::Model {
        user::Model {
            id: "u1".to_string(),
            username: "alice".to_string(),
            username_lower: "alice".to_string(),
            email: None,
            password_hash: "hash".to_string(),
            token: None,
            display_name: None,
            timezone: "UTC".to_string(),
            is_private: false,
            reminder_enabled: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn row(id: &str, name: &str, hours: f64, date: NaiveDate) -> activity::Model {
        activity::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            tile_id: None,
            duration_hours: hours,
            note: None,
            date,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn input(name: &str, hours: f64, date: NaiveDate) -> SaveActivityInput {
        SaveActivityInput {
            name: name.to_string(),
            tile_id: None,
            duration_hours: hours,
            note: None,
            date,
        }
    }

    fn service(
        activity_db: MockDatabase,
        user_db: MockDatabase,
        streak_db: MockDatabase,
    ) -> ActivityService {
        let tile_db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        ActivityService::new(
            ActivityRepository::new(Arc::new(activity_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            TileService::new(TileRepository::new(Arc::new(tile_db))),
            StreakService::new(StreakRepository::new(Arc::new(streak_db.into_connection()))),
        )
    }

    fn empty() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    #[test]
    fn test_validate_hours() {
        assert!(validate_hours(0.0).is_ok());
        assert!(validate_hours(24.0).is_ok());
        assert!(validate_hours(7.5).is_ok());
        assert!(validate_hours(-0.5).is_err());
        assert!(validate_hours(24.01).is_err());
        assert!(validate_hours(f64::NAN).is_err());
        assert!(validate_hours(f64::INFINITY).is_err());
    }

    #[test]
    fn test_day_total_replaces_same_name() {
        let date = today();
        let day = vec![row("a1", "work", 8.0, date), row("a2", "sleep", 8.0, date)];
        assert_eq!(day_total_with(&day, "work", 10.0), 18.0);
        assert_eq!(day_total_with(&day, "reading", 2.0), 18.0);
    }

    #[tokio::test]
    async fn test_save_rejects_total_over_24() {
        let date = today();
        let svc = service(
            empty().append_query_results([[
                row("a1", "work", 10.0, date),
                row("a2", "sleep", 9.0, date),
            ]]),
            empty().append_query_results([[test_user()]]),
            empty(),
        );
        let result = svc.save("u1", input("reading", 5.5, date)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_far_future() {
        let svc = service(
            empty(),
            empty().append_query_results([[test_user()]]),
            empty(),
        );
        let result = svc
            .save("u1", input("work", 1.0, today() + Duration::days(3)))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_blank_name_before_queries() {
        let svc = service(empty(), empty(), empty());
        let result = svc.save("u1", input("   ", 1.0, today())).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_save_zero_hours_deletes() {
        let date = today();
        let svc = service(
            empty()
                .append_query_results([[row("a1", "work", 3.0, date)]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
            empty().append_query_results([[test_user()]]),
            empty(),
        );
        let outcome = svc.save("u1", input("work", 0.0, date)).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Deleted));
    }

    #[tokio::test]
    async fn test_save_creates_and_advances_streak() {
        let date = today();
        let created = row("a1", "work", 7.5, date);
        let svc = service(
            empty()
                .append_query_results([Vec::<activity::Model>::new()])
                .append_query_results([[created.clone()]]),
            empty().append_query_results([[test_user()]]),
            empty()
                .append_query_results([Vec::<streak::Model>::new()])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
        );
        let outcome = svc.save("u1", input("work", 7.5, date)).await.unwrap();
        match outcome {
            SaveOutcome::Saved(a) => assert_eq!(a.duration_hours, 7.5),
            SaveOutcome::Deleted => panic!("expected a saved row"),
        }
    }

    #[tokio::test]
    async fn test_save_stores_canonical_tile_id() {
        const TILE: &str = "0b6f3c1e-6a2d-4f7b-9c1e-2d3f4a5b6c7d";
        let date = today();
        let activity_db = Arc::new(
            empty()
                .append_query_results([Vec::<activity::Model>::new()])
                .append_query_results([[row("a1", "guitar", 1.0, date)]])
                .into_connection(),
        );
        let tile_db = empty()
            .append_query_results([[custom_tile::Model {
                id: TILE.to_string(),
                user_id: "u1".to_string(),
                name: "Guitar".to_string(),
                name_lower: "guitar".to_string(),
                color: "#112233".to_string(),
                icon: None,
                created_at: Utc::now().into(),
            }]])
            .into_connection();
        let streak_db = empty()
            .append_query_results([Vec::<streak::Model>::new()])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let svc = ActivityService::new(
            ActivityRepository::new(activity_db.clone()),
            UserRepository::new(Arc::new(
                empty().append_query_results([[test_user()]]).into_connection(),
            )),
            TileService::new(TileRepository::new(Arc::new(tile_db))),
            StreakService::new(StreakRepository::new(Arc::new(streak_db))),
        );

        let mut request = input("guitar", 1.0, date);
        request.tile_id = Some(TILE.to_uppercase());
        svc.save("u1", request).await.unwrap();
        drop(svc);

        let log = Arc::try_unwrap(activity_db).unwrap().into_transaction_log();
        let insert = format!("{:?}", log[1]);
        assert!(insert.contains(TILE));
        assert!(!insert.contains(&TILE.to_uppercase()));
    }

    #[tokio::test]
    async fn test_save_exactly_24_is_allowed() {
        let date = today();
        let updated = row("a1", "sleep", 16.0, date);
        let svc = service(
            empty()
                .append_query_results([[
                    row("a1", "sleep", 8.0, date),
                    row("a2", "work", 8.0, date),
                ]])
                .append_query_results([[updated]]),
            empty().append_query_results([[test_user()]]),
            empty().append_query_results([[streak::Model {
                user_id: "u1".to_string(),
                current_streak: 1,
                longest_streak: 1,
                last_active_date: Some(date),
                updated_at: Utc::now().into(),
            }]]),
        );
        assert!(svc.save("u1", input("sleep", 16.0, date)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_range_limits() {
        let svc = service(empty(), empty(), empty());
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(svc.list_range("u1", from, from - Duration::days(1)).await.is_err());
        assert!(svc.list_range("u1", from, from + Duration::days(31)).await.is_err());
    }
}
