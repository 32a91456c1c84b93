//! Following service.
//!
//! Every change to a follow edge goes through [`FollowRepository::transition`],
//! which hands the current state to one of the pure decision functions below.

use std::collections::HashMap;

use chrono::Utc;
use habitgrid_common::{AppError, AppResult};
use habitgrid_db::{
    entities::{follow_counter, follow_edge_by_follower::FollowState, user},
    repositories::{FollowRepository, UserRepository},
};
use sea_orm::Set;
use serde::Serialize;

use crate::services::jobs::JobSender;
use crate::services::notification::{NotificationMetadata, NotificationService};

/// Default page size for follow listings.
const DEFAULT_LIMIT: u64 = 30;

/// Largest page size for follow listings.
const MAX_LIMIT: u64 = 100;

/// Target state of a new follow.
pub fn decide_follow(current: Option<FollowState>, target_private: bool) -> AppResult<FollowState> {
    match current {
        Some(FollowState::Active) => Err(AppError::Conflict("Already following".to_string())),
        Some(FollowState::Pending) => Err(AppError::Conflict(
            "Follow request already pending".to_string(),
        )),
        None | Some(FollowState::Removed) => Ok(if target_private {
            FollowState::Pending
        } else {
            FollowState::Active
        }),
    }
}

/// Unfollowing also cancels a pending request.
pub fn decide_unfollow(current: Option<FollowState>) -> AppResult<FollowState> {
    match current {
        Some(FollowState::Active | FollowState::Pending) => Ok(FollowState::Removed),
        _ => Err(AppError::NotFound("Not following".to_string())),
    }
}

/// Accepting or rejecting needs a pending request.
pub fn decide_request(current: Option<FollowState>, accept: bool) -> AppResult<FollowState> {
    match current {
        Some(FollowState::Pending) if accept => Ok(FollowState::Active),
        Some(FollowState::Pending) => Ok(FollowState::Removed),
        _ => Err(AppError::NotFound("Follow request not found".to_string())),
    }
}

/// Removing a follower needs an active edge.
pub fn decide_remove_follower(current: Option<FollowState>) -> AppResult<FollowState> {
    match current {
        Some(FollowState::Active) => Ok(FollowState::Removed),
        _ => Err(AppError::NotFound("Not a follower".to_string())),
    }
}

/// A user on the other end of a follow edge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEntry {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub since: chrono::DateTime<chrono::FixedOffset>,
}

/// Edge states between a viewer and another user, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub following: Option<FollowState>,
    pub followed_by: Option<FollowState>,
}

/// Follow counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
    pub pending: i64,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    user_repo: UserRepository,
    notification_service: NotificationService,
    job_sender: Option<JobSender>,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        follow_repo: FollowRepository,
        user_repo: UserRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            follow_repo,
            user_repo,
            notification_service,
            job_sender: None,
        }
    }

    /// Set the job sender for counter recounts.
    pub fn set_job_sender(&mut self, job_sender: JobSender) {
        self.job_sender = Some(job_sender);
    }

    /// Follow a user. Private users get a pending request instead.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<FollowState> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }

        let follower = self.user_repo.get_by_id(follower_id).await?;
        let followee = self.user_repo.get_by_id(followee_id).await?;
        let private = followee.is_private;

        let transition = self
            .follow_repo
            .transition(follower_id, followee_id, |current| {
                decide_follow(current, private)
            })
            .await?;

        let metadata = match transition.to {
            FollowState::Pending => NotificationMetadata::FollowRequest {
                username: follower.username.clone(),
            },
            _ => NotificationMetadata::Follow {
                username: follower.username.clone(),
            },
        };
        if let Err(e) = self
            .notification_service
            .notify(followee_id, Some(follower_id), metadata)
            .await
        {
            tracing::warn!(follower_id = %follower_id, followee_id = %followee_id, error = %e, "Failed to notify follow");
        }

        tracing::info!(follower_id = %follower_id, followee_id = %followee_id, state = ?transition.to, "Follow created");
        self.schedule_recount(&[follower_id, followee_id]).await;
        Ok(transition.to)
    }

    /// Unfollow, or withdraw a pending request.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        self.follow_repo
            .transition(follower_id, followee_id, decide_unfollow)
            .await?;
        self.schedule_recount(&[follower_id, followee_id]).await;
        Ok(())
    }

    /// Accept a pending request addressed to `followee_id`.
    pub async fn accept_request(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        let followee = self.user_repo.get_by_id(followee_id).await?;
        self.follow_repo
            .transition(follower_id, followee_id, |current| {
                decide_request(current, true)
            })
            .await?;

        if let Err(e) = self
            .notification_service
            .notify(
                follower_id,
                Some(followee_id),
                NotificationMetadata::FollowAccepted {
                    username: followee.username,
                },
            )
            .await
        {
            tracing::warn!(follower_id = %follower_id, followee_id = %followee_id, error = %e, "Failed to notify accepted request");
        }

        self.schedule_recount(&[follower_id, followee_id]).await;
        Ok(())
    }

    /// Reject a pending request addressed to `followee_id`.
    pub async fn reject_request(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        self.follow_repo
            .transition(follower_id, followee_id, |current| {
                decide_request(current, false)
            })
            .await?;
        self.schedule_recount(&[follower_id, followee_id]).await;
        Ok(())
    }

    /// Remove someone who follows `followee_id`.
    pub async fn remove_follower(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        self.follow_repo
            .transition(follower_id, followee_id, decide_remove_follower)
            .await?;
        self.schedule_recount(&[follower_id, followee_id]).await;
        Ok(())
    }

    /// Users actively following `user_id`.
    pub async fn followers(
        &self,
        user_id: &str,
        limit: Option<u64>,
        until_id: Option<&str>,
    ) -> AppResult<Vec<FollowEntry>> {
        let edges = self
            .follow_repo
            .find_followers(user_id, FollowState::Active, page(limit), until_id)
            .await?;
        self.resolve(
            edges
                .into_iter()
                .map(|e| (e.follower_id, e.updated_at))
                .collect(),
        )
        .await
    }

    /// Users `user_id` actively follows.
    pub async fn following(
        &self,
        user_id: &str,
        limit: Option<u64>,
        until_id: Option<&str>,
    ) -> AppResult<Vec<FollowEntry>> {
        let edges = self
            .follow_repo
            .find_following(user_id, FollowState::Active, page(limit), until_id)
            .await?;
        self.resolve(
            edges
                .into_iter()
                .map(|e| (e.followee_id, e.updated_at))
                .collect(),
        )
        .await
    }

    /// Requests waiting for `user_id` to answer.
    pub async fn pending_requests(
        &self,
        user_id: &str,
        limit: Option<u64>,
        until_id: Option<&str>,
    ) -> AppResult<Vec<FollowEntry>> {
        let edges = self
            .follow_repo
            .find_followers(user_id, FollowState::Pending, page(limit), until_id)
            .await?;
        self.resolve(
            edges
                .into_iter()
                .map(|e| (e.follower_id, e.updated_at))
                .collect(),
        )
        .await
    }

    /// Follow states between `viewer_id` and `other_id`.
    pub async fn relation(&self, viewer_id: &str, other_id: &str) -> AppResult<Relation> {
        let following = self.follow_repo.find_edge(viewer_id, other_id).await?;
        let followed_by = self.follow_repo.find_edge(other_id, viewer_id).await?;
        Ok(Relation {
            following: following.map(|e| e.state),
            followed_by: followed_by.map(|e| e.state),
        })
    }

    /// Whether `viewer_id` may see what `owner` shares with followers.
    pub async fn can_view(&self, viewer_id: &str, owner: &user::Model) -> AppResult<bool> {
        if viewer_id == owner.id || !owner.is_private {
            return Ok(true);
        }
        self.follow_repo.is_active_follower(viewer_id, &owner.id).await
    }

    /// Follow counters; zeros until the first recount.
    pub async fn counts(&self, user_id: &str) -> AppResult<FollowCounts> {
        Ok(self
            .follow_repo
            .find_counter(user_id)
            .await?
            .map(|c| FollowCounts {
                followers: c.followers_count,
                following: c.following_count,
                pending: c.pending_count,
            })
            .unwrap_or_default())
    }

    /// Recompute counters from the edge tables. Safe to run any number of times.
    pub async fn recount(&self, user_id: &str) -> AppResult<FollowCounts> {
        let counts = FollowCounts {
            followers: to_i64(
                self.follow_repo
                    .count_followers(user_id, FollowState::Active)
                    .await?,
            ),
            following: to_i64(
                self.follow_repo
                    .count_following(user_id, FollowState::Active)
                    .await?,
            ),
            pending: to_i64(
                self.follow_repo
                    .count_followers(user_id, FollowState::Pending)
                    .await?,
            ),
        };

        self.follow_repo
            .upsert_counter(follow_counter::ActiveModel {
                user_id: Set(user_id.to_string()),
                followers_count: Set(counts.followers),
                following_count: Set(counts.following),
                pending_count: Set(counts.pending),
                updated_at: Set(Utc::now().fixed_offset()),
            })
            .await?;

        tracing::debug!(user_id = %user_id, ?counts, "Follow counters recounted");
        Ok(counts)
    }

    async fn schedule_recount(&self, user_ids: &[&str]) {
        let Some(ref job_sender) = self.job_sender else {
            return;
        };
        for user_id in user_ids {
            if let Err(e) = job_sender.recount_follows((*user_id).to_string()).await {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to enqueue follow recount");
            }
        }
    }

    async fn resolve(
        &self,
        edges: Vec<(String, chrono::DateTime<chrono::FixedOffset>)>,
    ) -> AppResult<Vec<FollowEntry>> {
        let ids: Vec<String> = edges.iter().map(|(id, _)| id.clone()).collect();
        let users: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(edges
            .into_iter()
            .filter_map(|(id, since)| {
                users.get(&id).map(|u| FollowEntry {
                    user_id: id,
                    username: u.username.clone(),
                    display_name: u.display_name.clone(),
                    since,
                })
            })
            .collect())
    }
}

fn page(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
