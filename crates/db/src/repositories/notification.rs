//! Notification repository.

use std::sync::Arc;

use crate::entities::{
    Notification, NotificationDedupe, notification, notification::NotificationKind,
    notification_dedupe,
};
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr, sea_query::OnConflict,
};

/// Filters for listing notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    /// Only unread notifications.
    pub unread_only: bool,
    /// Only these kinds; empty means all.
    pub kinds: Vec<NotificationKind>,
}

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Claim the dedupe row and create the notification in one transaction.
    ///
    /// Returns `None` when another notification already holds the claim.
    pub async fn create_deduped(
        &self,
        claim: notification_dedupe::ActiveModel,
        model: notification::ActiveModel,
    ) -> AppResult<Option<notification::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let claimed = NotificationDedupe::insert(claim)
            .on_conflict(
                OnConflict::columns([
                    notification_dedupe::Column::UserId,
                    notification_dedupe::Column::ActorId,
                    notification_dedupe::Column::Kind,
                    notification_dedupe::Column::EntityType,
                    notification_dedupe::Column::EntityKey,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if claimed == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(None);
        }

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some(created))
    }

    /// Notifications of a user, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<notification::Model>> {
        let mut query = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::Id);

        if filter.unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }
        if !filter.kinds.is_empty() {
            query = query.filter(notification::Column::Kind.is_in(filter.kinds.clone()));
        }
        if let Some(id) = until_id {
            query = query.filter(notification::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count unread notifications.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark the given notifications of a user as read.
    pub async fn mark_read(&self, user_id: &str, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Id.is_in(ids.to_vec()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Mark all notifications of a user as read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Delete a notification owned by a user. Returns whether a row was removed.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<bool> {
        let result = Notification::delete_many()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_notification(id: &str) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            actor_id: Some("u2".to_string()),
            kind: NotificationKind::Like,
            entity_type: "summary".to_string(),
            entity_key: "2024-05-01".to_string(),
            metadata: serde_json::json!({"kind": "like", "date": "2024-05-01"}),
            is_read: false,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn claim() -> notification_dedupe::ActiveModel {
        notification_dedupe::ActiveModel {
            user_id: Set("u1".to_string()),
            actor_id: Set("u2".to_string()),
            kind: Set("like".to_string()),
            entity_type: Set("summary".to_string()),
            entity_key: Set("2024-05-01".to_string()),
            notification_id: Set("n1".to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        }
    }

    fn active(model: &notification::Model) -> notification::ActiveModel {
        notification::ActiveModel {
            id: Set(model.id.clone()),
            user_id: Set(model.user_id.clone()),
            actor_id: Set(model.actor_id.clone()),
            kind: Set(model.kind),
            entity_type: Set(model.entity_type.clone()),
            entity_key: Set(model.entity_key.clone()),
            metadata: Set(model.metadata.clone()),
            is_read: Set(false),
            created_at: Set(model.created_at),
        }
    }

    #[tokio::test]
    async fn test_create_deduped_first_claim_creates() {
        let model = create_test_notification("n1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[model.clone()]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let created = repo.create_deduped(claim(), active(&model)).await.unwrap();
        assert_eq!(created.unwrap().id, "n1");
    }

    #[tokio::test]
    async fn test_create_deduped_lost_claim_creates_nothing() {
        let model = create_test_notification("n2");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let created = repo.create_deduped(claim(), active(&model)).await.unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_empty_is_noop() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = NotificationRepository::new(db);
        assert_eq!(repo.mark_read("u1", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        assert!(!repo.delete("u1", "nope").await.unwrap());
    }
}
