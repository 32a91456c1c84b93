//! Follow edge and counter repository.
//!
//! Every state change writes both edge tables in one transaction, so the
//! follower-keyed and followee-keyed views never disagree.

use std::sync::Arc;

use crate::entities::{
    FollowCounter, FollowEdgeByFollowee, FollowEdgeByFollower, follow_counter,
    follow_edge_by_followee, follow_edge_by_follower,
    follow_edge_by_follower::FollowState,
};
use chrono::Utc;
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::OnConflict,
};

/// Result of a follow state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change; `None` when no edge existed.
    pub from: Option<FollowState>,
    /// State after the change.
    pub to: FollowState,
}

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the edge from `follower_id` to `followee_id`.
    pub async fn find_edge(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_edge_by_follower::Model>> {
        FollowEdgeByFollower::find_by_id((follower_id.to_string(), followee_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether `follower_id` actively follows `followee_id`.
    pub async fn is_active_follower(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self
            .find_edge(follower_id, followee_id)
            .await?
            .is_some_and(|edge| edge.state == FollowState::Active))
    }

    /// Move the edge to a new state.
    ///
    /// The current edge is read under a row lock and handed to `decide`,
    /// which returns the target state or an error that aborts the change.
    pub async fn transition<F>(
        &self,
        follower_id: &str,
        followee_id: &str,
        decide: F,
    ) -> AppResult<Transition>
    where
        F: FnOnce(Option<FollowState>) -> AppResult<FollowState> + Send,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let current = FollowEdgeByFollower::find_by_id((
            follower_id.to_string(),
            followee_id.to_string(),
        ))
        .lock_exclusive()
        .one(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .map(|edge| edge.state);

        let next = decide(current)?;
        let now = Utc::now().fixed_offset();

        FollowEdgeByFollower::insert(follow_edge_by_follower::ActiveModel {
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            state: Set(next),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([
                follow_edge_by_follower::Column::FollowerId,
                follow_edge_by_follower::Column::FolloweeId,
            ])
            .update_columns([
                follow_edge_by_follower::Column::State,
                follow_edge_by_follower::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        FollowEdgeByFollowee::insert(follow_edge_by_followee::ActiveModel {
            followee_id: Set(followee_id.to_string()),
            follower_id: Set(follower_id.to_string()),
            state: Set(next),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([
                follow_edge_by_followee::Column::FolloweeId,
                follow_edge_by_followee::Column::FollowerId,
            ])
            .update_columns([
                follow_edge_by_followee::Column::State,
                follow_edge_by_followee::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Transition {
            from: current,
            to: next,
        })
    }

    /// Outgoing edges of a user in a state, paginated by followee id.
    pub async fn find_following(
        &self,
        user_id: &str,
        state: FollowState,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge_by_follower::Model>> {
        let mut query = FollowEdgeByFollower::find()
            .filter(follow_edge_by_follower::Column::FollowerId.eq(user_id))
            .filter(follow_edge_by_follower::Column::State.eq(state))
            .order_by_desc(follow_edge_by_follower::Column::FolloweeId);

        if let Some(id) = until_id {
            query = query.filter(follow_edge_by_follower::Column::FolloweeId.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Incoming edges of a user in a state, paginated by follower id.
    pub async fn find_followers(
        &self,
        user_id: &str,
        state: FollowState,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge_by_followee::Model>> {
        let mut query = FollowEdgeByFollowee::find()
            .filter(follow_edge_by_followee::Column::FolloweeId.eq(user_id))
            .filter(follow_edge_by_followee::Column::State.eq(state))
            .order_by_desc(follow_edge_by_followee::Column::FollowerId);

        if let Some(id) = until_id {
            query = query.filter(follow_edge_by_followee::Column::FollowerId.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of everyone actively following a user.
    pub async fn active_follower_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let edges = FollowEdgeByFollowee::find()
            .filter(follow_edge_by_followee::Column::FolloweeId.eq(user_id))
            .filter(follow_edge_by_followee::Column::State.eq(FollowState::Active))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(edges.into_iter().map(|edge| edge.follower_id).collect())
    }

    /// Count incoming edges in a state.
    pub async fn count_followers(&self, user_id: &str, state: FollowState) -> AppResult<u64> {
        FollowEdgeByFollowee::find()
            .filter(follow_edge_by_followee::Column::FolloweeId.eq(user_id))
            .filter(follow_edge_by_followee::Column::State.eq(state))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count outgoing edges in a state.
    pub async fn count_following(&self, user_id: &str, state: FollowState) -> AppResult<u64> {
        FollowEdgeByFollower::find()
            .filter(follow_edge_by_follower::Column::FollowerId.eq(user_id))
            .filter(follow_edge_by_follower::Column::State.eq(state))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the stored counter of a user.
    pub async fn find_counter(&self, user_id: &str) -> AppResult<Option<follow_counter::Model>> {
        FollowCounter::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite the counter of a user with freshly counted values.
    pub async fn upsert_counter(&self, model: follow_counter::ActiveModel) -> AppResult<()> {
        FollowCounter::insert(model)
            .on_conflict(
                OnConflict::column(follow_counter::Column::UserId)
                    .update_columns([
                        follow_counter::Column::FollowersCount,
                        follow_counter::Column::FollowingCount,
                        follow_counter::Column::PendingCount,
                        follow_counter::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn edge(follower: &str, followee: &str, state: FollowState) -> follow_edge_by_follower::Model {
        let now = Utc::now().fixed_offset();
        follow_edge_by_follower::Model {
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
            state,
            created_at: now,
            updated_at: now,
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn test_is_active_follower() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge("a", "b", FollowState::Pending)]])
                .append_query_results([[edge("a", "b", FollowState::Active)]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        assert!(!repo.is_active_follower("a", "b").await.unwrap());
        assert!(repo.is_active_follower("a", "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_transition_writes_both_edges() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow_edge_by_follower::Model>::new()])
                .append_exec_results([exec_ok(), exec_ok()])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo
            .transition("a", "b", |current| {
                assert_eq!(current, None);
                Ok(FollowState::Active)
            })
            .await
            .unwrap();

        assert_eq!(result.from, None);
        assert_eq!(result.to, FollowState::Active);
    }

    #[tokio::test]
    async fn test_transition_rejected_by_decision() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge("a", "b", FollowState::Active)]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let result = repo
            .transition("a", "b", |_| Err(AppError::Conflict("Already following".into())))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_count_followers() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3))
                }]])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let count = repo.count_followers("b", FollowState::Active).await.unwrap();
        assert_eq!(count, 3);
    }
}
