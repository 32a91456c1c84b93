//! Daily summaries and the following feed.

use chrono::NaiveDate;
use habitgrid_common::{AppError, AppResult};
use habitgrid_db::{
    entities::{activity, follow_edge_by_follower::FollowState, user},
    repositories::{ActivityRepository, FollowRepository, UserRepository},
};
use serde::Serialize;

use crate::services::activity::HOURS_PER_DAY;
use crate::services::like::LikeService;
use crate::services::streak::{StreakService, StreakState};

/// Default feed page size.
const DEFAULT_FEED_LIMIT: u64 = 20;

/// One user's day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub date: NaiveDate,
    pub activities: Vec<activity::Model>,
    pub total_hours: f64,
    pub unallocated_hours: f64,
    pub like_count: u64,
    pub liked_by_viewer: bool,
    pub viewer_reaction: Option<String>,
    pub current_streak: i32,
}

/// Logged and unallocated hours of a day.
#[must_use]
pub fn hour_totals(activities: &[activity::Model]) -> (f64, f64) {
    let total: f64 = activities.iter().map(|a| a.duration_hours).sum();
    (total, (HOURS_PER_DAY - total).max(0.0))
}

/// Summary service for business logic.
#[derive(Clone)]
pub struct SummaryService {
    user_repo: UserRepository,
    activity_repo: ActivityRepository,
    follow_repo: FollowRepository,
    like_service: LikeService,
    streak_service: StreakService,
}

impl SummaryService {
    /// Create a new summary service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        activity_repo: ActivityRepository,
        follow_repo: FollowRepository,
        like_service: LikeService,
        streak_service: StreakService,
    ) -> Self {
        Self {
            user_repo,
            activity_repo,
            follow_repo,
            like_service,
            streak_service,
        }
    }

    /// A user's summary for a date, if the viewer may see it.
    pub async fn show(
        &self,
        viewer_id: &str,
        owner_id: &str,
        date: NaiveDate,
    ) -> AppResult<DailySummary> {
        let owner = self.user_repo.get_by_id(owner_id).await?;
        self.ensure_visible(viewer_id, &owner).await?;
        self.build(viewer_id, owner, date).await
    }

    /// Summaries of everyone the viewer actively follows, paginated by user id.
    pub async fn feed(
        &self,
        viewer_id: &str,
        date: NaiveDate,
        limit: Option<u64>,
        until_id: Option<&str>,
    ) -> AppResult<Vec<DailySummary>> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, 100);
        let edges = self
            .follow_repo
            .find_following(viewer_id, FollowState::Active, limit, until_id)
            .await?;
        let ids: Vec<String> = edges.into_iter().map(|e| e.followee_id).collect();
        let mut users = self.user_repo.find_by_ids(&ids).await?;
        // keep the cursor order of the edge query
        users.sort_by(|a, b| b.id.cmp(&a.id));

        let mut summaries = Vec::with_capacity(users.len());
        for owner in users {
            summaries.push(self.build(viewer_id, owner, date).await?);
        }
        Ok(summaries)
    }

    /// A user's streak, if the viewer may see it.
    pub async fn streak(&self, viewer_id: &str, owner_id: &str) -> AppResult<StreakState> {
        let owner = self.user_repo.get_by_id(owner_id).await?;
        self.ensure_visible(viewer_id, &owner).await?;
        self.streak_service.get(owner_id).await
    }

    async fn build(
        &self,
        viewer_id: &str,
        owner: user::Model,
        date: NaiveDate,
    ) -> AppResult<DailySummary> {
        let activities = self.activity_repo.find_by_user_date(&owner.id, date).await?;
        let (total_hours, unallocated_hours) = hour_totals(&activities);
        let likes = self.like_service.state(viewer_id, &owner.id, date).await?;
        let streak = self.streak_service.get(&owner.id).await?;

        Ok(DailySummary {
            user_id: owner.id,
            username: owner.username,
            display_name: owner.display_name,
            date,
            activities,
            total_hours,
            unallocated_hours,
            like_count: likes.count,
            liked_by_viewer: likes.liked,
            viewer_reaction: likes.reaction,
            current_streak: streak.current,
        })
    }

    async fn ensure_visible(&self, viewer_id: &str, owner: &user::Model) -> AppResult<()> {
        if viewer_id == owner.id
            || !owner.is_private
            || self.follow_repo.is_active_follower(viewer_id, &owner.id).await?
        {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This user's summaries are private".to_string(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use habitgrid_db::{
        entities::{follow_edge_by_follower, streak, summary_like},
        repositories::{LikeRepository, NotificationRepository, StreakRepository},
    };
    use crate::services::notification::NotificationService;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str, is_private: bool) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: None,
            password_hash: "hash".to_string(),
            token: None,
            display_name: None,
            timezone: "UTC".to_string(),
            is_private,
            reminder_enabled: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn row(name: &str, hours: f64) -> activity::Model {
        activity::Model {
            id: format!("a-{name}"),
            user_id: "u2".to_string(),
            name: name.to_string(),
            tile_id: None,
            duration_hours: hours,
            note: None,
            date: date(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn empty() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    struct Dbs {
        user: MockDatabase,
        activity: MockDatabase,
        follow: MockDatabase,
        like: MockDatabase,
        streak: MockDatabase,
    }

    fn service(dbs: Dbs) -> SummaryService {
        let follow_repo = FollowRepository::new(Arc::new(dbs.follow.into_connection()));
        let user_repo = UserRepository::new(Arc::new(dbs.user.into_connection()));
        let like_service = LikeService::new(
            LikeRepository::new(Arc::new(dbs.like.into_connection())),
            user_repo.clone(),
            follow_repo.clone(),
            NotificationService::new(NotificationRepository::new(Arc::new(
                empty().into_connection(),
            ))),
        );
        SummaryService::new(
            user_repo,
            ActivityRepository::new(Arc::new(dbs.activity.into_connection())),
            follow_repo,
            like_service,
            StreakService::new(StreakRepository::new(Arc::new(dbs.streak.into_connection()))),
        )
    }

    #[test]
    fn test_hour_totals() {
        let (total, free) = hour_totals(&[row("work", 8.0), row("sleep", 7.5)]);
        assert_eq!(total, 15.5);
        assert_eq!(free, 8.5);
        assert_eq!(hour_totals(&[]), (0.0, 24.0));
    }

    #[tokio::test]
    async fn test_private_summary_hidden_from_non_followers() {
        let service = service(Dbs {
            user: empty().append_query_results([[create_test_user("u2", "bob", true)]]),
            activity: empty(),
            follow: empty().append_query_results([[follow_edge_by_follower::Model {
                follower_id: "u1".to_string(),
                followee_id: "u2".to_string(),
                state: FollowState::Pending,
                created_at: Utc::now().into(),
                updated_at: Utc::now().into(),
            }]]),
            like: empty(),
            streak: empty(),
        });
        let result = service.show("u1", "u2", date()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_show_public_summary() {
        let service = service(Dbs {
            user: empty().append_query_results([[create_test_user("u2", "bob", false)]]),
            activity: empty().append_query_results([[row("work", 8.0), row("gym", 1.5)]]),
            follow: empty(),
            like: empty()
                .append_query_results([[summary_like::Model {
                    id: "l1".to_string(),
                    liker_id: "u1".to_string(),
                    liked_user_id: "u2".to_string(),
                    date: date(),
                    reaction: Some("🔥".to_string()),
                    created_at: Utc::now().into(),
                }]])
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(2)),
                }]]),
            streak: empty().append_query_results([[streak::Model {
                user_id: "u2".to_string(),
                current_streak: 4,
                longest_streak: 9,
                last_active_date: Some(date()),
                updated_at: Utc::now().into(),
            }]]),
        });

        let summary = service.show("u1", "u2", date()).await.unwrap();
        assert_eq!(summary.total_hours, 9.5);
        assert_eq!(summary.unallocated_hours, 14.5);
        assert_eq!(summary.like_count, 2);
        assert!(summary.liked_by_viewer);
        assert_eq!(summary.viewer_reaction.as_deref(), Some("🔥"));
        assert_eq!(summary.current_streak, 4);
    }

    #[tokio::test]
    async fn test_feed_empty_when_following_nobody() {
        let service = service(Dbs {
            user: empty(),
            activity: empty(),
            follow: empty().append_query_results([Vec::<follow_edge_by_follower::Model>::new()]),
            like: empty(),
            streak: empty(),
        });
        assert!(service.feed("u1", date(), None, None).await.unwrap().is_empty());
    }
}
