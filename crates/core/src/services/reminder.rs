//! Daily "log your day" reminders.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use habitgrid_common::{AppResult, local_date};
use habitgrid_db::repositories::{ActivityRepository, UserRepository};

use crate::services::email::EmailService;
use crate::services::notification::{NotificationMetadata, NotificationService};

/// Users loaded per page.
const PAGE_SIZE: u64 = 200;

/// What one reminder run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub checked: u64,
    pub notified: u64,
    pub emailed: u64,
}

impl std::fmt::Display for ReminderReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "checked {}, notified {}, emailed {}",
            self.checked, self.notified, self.emailed
        )
    }
}

/// Reminder service.
#[derive(Clone)]
pub struct ReminderService {
    user_repo: UserRepository,
    activity_repo: ActivityRepository,
    notification_service: NotificationService,
    email_service: EmailService,
}

impl ReminderService {
    /// Create a new reminder service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        activity_repo: ActivityRepository,
        notification_service: NotificationService,
        email_service: EmailService,
    ) -> Self {
        Self {
            user_repo,
            activity_repo,
            notification_service,
            email_service,
        }
    }

    /// Remind every opted-in user with nothing logged on their local date.
    ///
    /// The reminder notification is deduplicated per date, so the email only
    /// goes out with the first notification of the day.
    pub async fn run(&self, now: DateTime<Utc>) -> AppResult<ReminderReport> {
        let mut report = ReminderReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let users = self
                .user_repo
                .find_reminder_candidates(PAGE_SIZE, cursor.as_deref())
                .await?;
            let Some(last) = users.last() else {
                break;
            };
            cursor = Some(last.id.clone());
            let page_len = users.len() as u64;

            for user in users {
                report.checked += 1;
                let tz: Tz = user.timezone.parse().unwrap_or(Tz::UTC);
                let date = local_date(tz, now);

                if self.activity_repo.exists_on(&user.id, date).await? {
                    continue;
                }

                let created = self
                    .notification_service
                    .notify(&user.id, None, NotificationMetadata::Reminder { date })
                    .await?;
                if created.is_none() {
                    continue;
                }
                report.notified += 1;

                let Some(ref email) = user.email else {
                    continue;
                };
                match self.email_service.send_reminder(email, &user.username, date).await {
                    Ok(true) => report.emailed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(user_id = %user.id, error = %e, "Reminder email failed");
                    }
                }
            }

            if page_len < PAGE_SIZE {
                break;
            }
        }

        tracing::info!(
            checked = report.checked,
            notified = report.notified,
            emailed = report.emailed,
            "Reminder run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::email::{EmailMessage, EmailSender};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use habitgrid_db::{
        entities::{notification, user},
        repositories::NotificationRepository,
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: EmailMessage) -> AppResult<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn user(id: &str, timezone: &str, email: Option<&str>) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: format!("user{id}"),
            username_lower: format!("user{id}"),
            email: email.map(ToString::to_string),
            password_hash: "hash".to_string(),
            token: None,
            display_name: None,
            timezone: timezone.to_string(),
            is_private: false,
            reminder_enabled: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn count(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    fn reminder(user_id: &str, date: NaiveDate) -> notification::Model {
        notification::Model {
            id: format!("n-{user_id}"),
            user_id: user_id.to_string(),
            actor_id: None,
            kind: notification::NotificationKind::Reminder,
            entity_type: "day".to_string(),
            entity_key: date.to_string(),
            metadata: serde_json::json!({"kind": "reminder", "date": date}),
            is_read: false,
            created_at: Utc::now().into(),
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn test_run_reminds_idle_users() {
        // 20:00 UTC is already the next day in Tokyo
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let utc_day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let tokyo_day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();

        let users = vec![
            user("1", "UTC", Some("one@example.com")),
            user("2", "Asia/Tokyo", None),
            user("3", "UTC", Some("three@example.com")),
        ];

        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([users])
            .into_connection();
        // exists_on: user 1 idle, user 2 idle, user 3 logged
        let activity_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count(0)]])
            .append_query_results([[count(0)]])
            .append_query_results([[count(1)]])
            .into_connection();
        let notification_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .append_query_results([[reminder("1", utc_day)]])
            .append_exec_results([exec(1)])
            .append_query_results([[reminder("2", tokyo_day)]])
            .into_connection();

        let sender = Arc::new(RecordingSender::default());
        let service = ReminderService::new(
            UserRepository::new(Arc::new(user_db)),
            ActivityRepository::new(Arc::new(activity_db)),
            NotificationService::new(NotificationRepository::new(Arc::new(notification_db))),
            EmailService::new(Some(sender.clone()), "https://habitgrid.example".to_string()),
        );

        let report = service.run(now).await.unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.notified, 2);
        assert_eq!(report.emailed, 1);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].to, "one@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_reminder_sends_no_email() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user("1", "UTC", Some("one@example.com"))]])
            .into_connection();
        let activity_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count(0)]])
            .into_connection();
        // dedupe claim lost
        let notification_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0)])
            .into_connection();

        let sender = Arc::new(RecordingSender::default());
        let service = ReminderService::new(
            UserRepository::new(Arc::new(user_db)),
            ActivityRepository::new(Arc::new(activity_db)),
            NotificationService::new(NotificationRepository::new(Arc::new(notification_db))),
            EmailService::new(Some(sender.clone()), "https://habitgrid.example".to_string()),
        );

        let report = service.run(now).await.unwrap();
        assert_eq!(report.notified, 0);
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
