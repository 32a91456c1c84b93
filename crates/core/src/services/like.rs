//! Likes and emoji reactions on daily summaries.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use habitgrid_common::{AppError, AppResult, IdGenerator};
use habitgrid_db::{
    entities::{summary_like, user},
    repositories::{FollowRepository, LikeRepository, UserRepository},
};
use sea_orm::Set;
use serde::Serialize;

use crate::services::notification::{NotificationMetadata, NotificationService};

/// Longest reaction accepted, in UTF-8 bytes.
pub const MAX_REACTION_BYTES: usize = 16;

const fn is_regional_indicator(c: char) -> bool {
    matches!(c, '\u{1F1E6}'..='\u{1F1FF}')
}

/// Code points that can start an emoji presentation sequence.
const fn is_pictographic(c: char) -> bool {
    matches!(
        c,
        '\u{00A9}'
            | '\u{00AE}'
            | '\u{203C}'
            | '\u{2049}'
            | '\u{2122}'
            | '\u{2139}'
            | '\u{2194}'..='\u{2199}'
            | '\u{21A9}'..='\u{21AA}'
            | '\u{231A}'..='\u{231B}'
            | '\u{2328}'
            | '\u{2388}'
            | '\u{23CF}'
            | '\u{23E9}'..='\u{23F3}'
            | '\u{23F8}'..='\u{23FA}'
            | '\u{24C2}'
            | '\u{25AA}'..='\u{25AB}'
            | '\u{25B6}'
            | '\u{25C0}'
            | '\u{25FB}'..='\u{25FE}'
            | '\u{2600}'..='\u{27BF}'
            | '\u{2934}'..='\u{2935}'
            | '\u{2B05}'..='\u{2B07}'
            | '\u{2B1B}'..='\u{2B1C}'
            | '\u{2B50}'
            | '\u{2B55}'
            | '\u{3030}'
            | '\u{303D}'
            | '\u{3297}'
            | '\u{3299}'
            | '\u{1F000}'..='\u{1F1E5}'
            | '\u{1F200}'..='\u{1F3FA}'
            | '\u{1F400}'..='\u{1FAFF}'
            | '\u{1FC00}'..='\u{1FFFD}'
    )
}

/// Whether `value` looks like exactly one emoji grapheme.
///
/// Accepts a base character followed by variation selectors, skin tone
/// modifiers, keycap marks, tag characters, ZWJ sequences or a second
/// regional indicator (flags).
#[must_use]
pub fn is_single_emoji(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_REACTION_BYTES {
        return false;
    }

    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first.is_whitespace() || first.is_control() {
        return false;
    }

    let mut regional = usize::from(is_regional_indicator(first));
    if regional == 0 && !is_pictographic(first) && !matches!(first, '0'..='9' | '#' | '*') {
        return false;
    }
    let mut after_zwj = false;
    let mut keycap = false;

    for c in chars {
        if after_zwj {
            if c.is_whitespace() || c.is_control() || c.is_ascii() {
                return false;
            }
            after_zwj = false;
            continue;
        }
        match c {
            '\u{200D}' => after_zwj = true,
            '\u{20E3}' => keycap = true,
            '\u{FE0E}' | '\u{FE0F}' | '\u{1F3FB}'..='\u{1F3FF}' | '\u{E0020}'..='\u{E007F}' => {}
            c if is_regional_indicator(c) && regional == 1 => regional += 1,
            _ => return false,
        }
    }

    if after_zwj {
        return false;
    }
    if keycap {
        return matches!(first, '0'..='9' | '#' | '*');
    }
    is_pictographic(first) || regional == 2
}

/// Like state of a summary as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub reaction: Option<String>,
    pub count: u64,
}

/// Someone who liked a summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liker {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub reaction: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    like_repo: LikeRepository,
    user_repo: UserRepository,
    follow_repo: FollowRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub const fn new(
        like_repo: LikeRepository,
        user_repo: UserRepository,
        follow_repo: FollowRepository,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            like_repo,
            user_repo,
            follow_repo,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Like the summary if not liked yet, otherwise take the like back.
    pub async fn toggle(
        &self,
        liker_id: &str,
        owner_id: &str,
        date: NaiveDate,
    ) -> AppResult<LikeState> {
        self.ensure_can_like(liker_id, owner_id).await?;

        if let Some(existing) = self.like_repo.find(liker_id, owner_id, date).await? {
            self.like_repo.delete(existing).await?;
            let count = self.like_repo.count(owner_id, date).await?;
            return Ok(LikeState {
                liked: false,
                reaction: None,
                count,
            });
        }

        self.insert_like(liker_id, owner_id, date, None).await
    }

    /// Set the reaction, liking the summary first if needed.
    pub async fn react(
        &self,
        liker_id: &str,
        owner_id: &str,
        date: NaiveDate,
        reaction: &str,
    ) -> AppResult<LikeState> {
        if !is_single_emoji(reaction) {
            return Err(AppError::Validation(
                "reaction must be a single emoji".to_string(),
            ));
        }
        self.ensure_can_like(liker_id, owner_id).await?;

        if let Some(existing) = self.like_repo.find(liker_id, owner_id, date).await? {
            let mut active: summary_like::ActiveModel = existing.into();
            active.reaction = Set(Some(reaction.to_string()));
            let updated = self.like_repo.update(active).await?;
            let count = self.like_repo.count(owner_id, date).await?;
            return Ok(LikeState {
                liked: true,
                reaction: updated.reaction,
                count,
            });
        }

        self.insert_like(liker_id, owner_id, date, Some(reaction.to_string()))
            .await
    }

    /// The viewer's like state for a summary.
    pub async fn state(
        &self,
        viewer_id: &str,
        owner_id: &str,
        date: NaiveDate,
    ) -> AppResult<LikeState> {
        let mine = self.like_repo.find(viewer_id, owner_id, date).await?;
        let count = self.like_repo.count(owner_id, date).await?;
        Ok(LikeState {
            liked: mine.is_some(),
            reaction: mine.and_then(|l| l.reaction),
            count,
        })
    }

    /// Users who liked a summary, newest first.
    pub async fn likers(
        &self,
        viewer_id: &str,
        owner_id: &str,
        date: NaiveDate,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<Liker>> {
        let owner = self.user_repo.get_by_id(owner_id).await?;
        self.ensure_visible(viewer_id, &owner).await?;

        let likes = self
            .like_repo
            .find_by_summary(owner_id, date, limit, until_id)
            .await?;
        let ids: Vec<String> = likes.iter().map(|l| l.liker_id.clone()).collect();
        let users: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(likes
            .into_iter()
            .filter_map(|l| {
                users.get(&l.liker_id).map(|u| Liker {
                    id: l.id,
                    user_id: l.liker_id,
                    username: u.username.clone(),
                    reaction: l.reaction,
                    created_at: l.created_at,
                })
            })
            .collect())
    }

    async fn insert_like(
        &self,
        liker_id: &str,
        owner_id: &str,
        date: NaiveDate,
        reaction: Option<String>,
    ) -> AppResult<LikeState> {
        let created = self
            .like_repo
            .create(summary_like::ActiveModel {
                id: Set(self.id_gen.generate()),
                liker_id: Set(liker_id.to_string()),
                liked_user_id: Set(owner_id.to_string()),
                date: Set(date),
                reaction: Set(reaction),
                created_at: Set(Utc::now().fixed_offset()),
            })
            .await?;

        if let Err(e) = self
            .notify_owner(liker_id, owner_id, date, created.reaction.clone())
            .await
        {
            tracing::warn!(liker_id = %liker_id, owner_id = %owner_id, error = %e, "Failed to notify like");
        }

        let count = self.like_repo.count(owner_id, date).await?;
        Ok(LikeState {
            liked: true,
            reaction: created.reaction,
            count,
        })
    }

    async fn notify_owner(
        &self,
        liker_id: &str,
        owner_id: &str,
        date: NaiveDate,
        reaction: Option<String>,
    ) -> AppResult<()> {
        let liker = self.user_repo.get_by_id(liker_id).await?;
        self.notification_service
            .notify(
                owner_id,
                Some(liker_id),
                NotificationMetadata::Like {
                    username: liker.username,
                    date,
                    reaction,
                },
            )
            .await?;
        Ok(())
    }

    async fn ensure_can_like(&self, liker_id: &str, owner_id: &str) -> AppResult<()> {
        if liker_id == owner_id {
            return Err(AppError::BadRequest(
                "Cannot like your own summary".to_string(),
            ));
        }
        let owner = self.user_repo.get_by_id(owner_id).await?;
        self.ensure_visible(liker_id, &owner).await
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
