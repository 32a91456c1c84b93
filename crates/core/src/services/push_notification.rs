//! Web Push subscriptions, preferences and delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use habitgrid_common::{
    AppError, AppResult, IdGenerator, config::PushConfig, parse_hhmm, time::local_time,
};
use habitgrid_db::{
    entities::{
        notification::NotificationKind,
        push_delivery_log::{self, DeliveryStatus},
        push_preference, push_subscription,
    },
    repositories::{NotificationRepository, PushSubscriptionRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessage, WebPushMessageBuilder,
};

use crate::services::notification::decode_metadata;

/// Push message time-to-live: one day.
pub const PUSH_TTL_SECS: u32 = 86_400;

/// Consecutive failures after which a subscription is disabled.
pub const MAX_CONSECUTIVE_FAILURES: i32 = 5;

/// Configuration for VAPID (Voluntary Application Server Identification).
#[derive(Debug, Clone)]
pub struct VapidConfig {
    /// Public key (base64 URL-safe encoded), handed to browsers
    pub public_key: String,
    /// Private key in PEM form
    pub private_key_pem: String,
    /// Subject (typically a mailto: or https: URL)
    pub subject: String,
}

impl From<&PushConfig> for VapidConfig {
    fn from(config: &PushConfig) -> Self {
        Self {
            public_key: config.vapid_public_key.clone(),
            private_key_pem: config.vapid_private_key_pem.clone(),
            subject: config.subject.clone(),
        }
    }
}

/// Quiet-hour window `[start, end)` in the user's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Parse optional `HH:MM` bounds. Both or neither must be set.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> AppResult<Option<Self>> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some(Self {
                start: parse_hhmm(start)?,
                end: parse_hhmm(end)?,
            })),
            _ => Err(AppError::Validation(
                "quiet hours need both a start and an end".to_string(),
            )),
        }
    }

    /// Whether `now` falls in the window. Wraps midnight when `start > end`;
    /// an empty window (`start == end`) never matches.
    #[must_use]
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start == self.end {
            false
        } else if self.start < self.end {
            self.start <= now && now < self.end
        } else {
            now >= self.start || now < self.end
        }
    }
}

/// Result of handing one message to a push service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The push service answered with this HTTP status.
    Response { status: u16, error: Option<String> },
    /// The request never got an answer.
    Transport(String),
    /// The message could not be built, e.g. malformed subscription keys.
    Invalid(String),
}

/// Map a push service HTTP status to a delivery status.
#[must_use]
pub const fn classify_status(status: u16) -> DeliveryStatus {
    match status {
        200..=299 => DeliveryStatus::Sent,
        404 | 410 => DeliveryStatus::Gone,
        429 | 500..=599 => DeliveryStatus::Retryable,
        _ => DeliveryStatus::Rejected,
    }
}

/// Map a send outcome to a delivery status.
#[must_use]
pub const fn classify(outcome: &SendOutcome) -> DeliveryStatus {
    match outcome {
        SendOutcome::Response { status, .. } => classify_status(*status),
        SendOutcome::Transport(_) => DeliveryStatus::Retryable,
        SendOutcome::Invalid(_) => DeliveryStatus::Rejected,
    }
}

/// What a final delivery status does to its subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionUpdate {
    /// Reset the failure count and stamp the success.
    Succeeded,
    /// Record one more consecutive failure.
    Failed { failures: i32, disable: bool },
    /// Delete the subscription.
    Remove,
    Unchanged,
}

/// Bookkeeping for a subscription that had `failure_count` consecutive
/// failures before this delivery.
#[must_use]
pub const fn subscription_update(failure_count: i32, status: DeliveryStatus) -> SubscriptionUpdate {
    match status {
        DeliveryStatus::Sent => SubscriptionUpdate::Succeeded,
        DeliveryStatus::Gone => SubscriptionUpdate::Remove,
        DeliveryStatus::Retryable | DeliveryStatus::Rejected => {
            let failures = failure_count.saturating_add(1);
            SubscriptionUpdate::Failed {
                failures,
                disable: failures >= MAX_CONSECUTIVE_FAILURES,
            }
        }
        DeliveryStatus::SkippedQuietHours | DeliveryStatus::SkippedOptOut => {
            SubscriptionUpdate::Unchanged
        }
    }
}

/// Idempotency key of one notification on one subscription.
#[must_use]
pub fn message_id(notification_id: &str, subscription_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(notification_id.as_bytes());
    hasher.update(b":");
    hasher.update(subscription_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Retry policy with exponential backoff for retryable sends.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-indexed).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        Duration::from_secs_f64(self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent))
    }

    /// Whether another attempt may follow attempt number `attempt`.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Body of a push message as the service worker receives it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub url: String,
    pub notification_id: String,
}

/// Something that can hand an encrypted message to a push service.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Send `payload` to one subscription.
    async fn send(
        &self,
        subscription: &push_subscription::Model,
        payload: &[u8],
        ttl: u32,
    ) -> SendOutcome;
}

/// [`PushSender`] speaking the Web Push protocol: `aes128gcm` payload
/// encryption and a VAPID signature.
pub struct WebPushSender {
    client: IsahcWebPushClient,
    vapid: VapidConfig,
}

impl WebPushSender {
    /// Create a sender with its own HTTP client.
    pub fn new(vapid: VapidConfig) -> AppResult<Self> {
        let client = IsahcWebPushClient::new()
            .map_err(|e| AppError::Config(format!("Failed to create push client: {e}")))?;
        Ok(Self { client, vapid })
    }

    fn build_message(
        &self,
        subscription: &push_subscription::Model,
        payload: &[u8],
        ttl: u32,
    ) -> Result<WebPushMessage, WebPushError> {
        let info = SubscriptionInfo::new(
            subscription.endpoint.as_str(),
            subscription.p256dh.as_str(),
            subscription.auth.as_str(),
        );

        let mut signature =
            VapidSignatureBuilder::from_pem(self.vapid.private_key_pem.as_bytes(), &info)?;
        signature.add_claim("sub", self.vapid.subject.clone());
        let signature = signature.build()?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_ttl(ttl);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.build()
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &push_subscription::Model,
        payload: &[u8],
        ttl: u32,
    ) -> SendOutcome {
        let message = match self.build_message(subscription, payload, ttl) {
            Ok(message) => message,
            Err(e) => return SendOutcome::Invalid(e.to_string()),
        };

        match self.client.send(message).await {
            Ok(()) => SendOutcome::Response {
                status: 201,
                error: None,
            },
            Err(e) => outcome_from_error(e),
        }
    }
}

/// The client reports statuses as error variants; map them back to a
/// representative status code.
fn outcome_from_error(error: WebPushError) -> SendOutcome {
    let status = match error {
        WebPushError::EndpointNotFound { .. } => 404,
        WebPushError::EndpointNotValid { .. } => 410,
        WebPushError::Unauthorized { .. } => 401,
        WebPushError::BadRequest { .. } => 400,
        WebPushError::PayloadTooLarge { .. } => 413,
        WebPushError::ServerError { .. } => 503,
        other => return SendOutcome::Transport(other.to_string()),
    };
    SendOutcome::Response {
        status,
        error: Some(error_label(status).to_string()),
    }
}

const fn error_label(status: u16) -> &'static str {
    match status {
        404 => "endpoint not found",
        410 => "endpoint gone",
        401 => "unauthorized",
        400 => "bad request",
        413 => "payload too large",
        _ => "push service error",
    }
}

/// Input for subscribing a browser, in `PushSubscription.toJSON()` shape.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeInput {
    #[validate(url, length(max = 2048))]
    pub endpoint: String,
    #[validate(nested)]
    pub keys: SubscriptionKeys,
}

/// Client keys of a push subscription.
#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionKeys {
    #[validate(length(min = 1, max = 256))]
    pub p256dh: String,
    #[validate(length(min = 1, max = 256))]
    pub auth: String,
}

/// New push preferences. Replaces the stored ones entirely.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesInput {
    pub enabled: bool,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
    #[serde(default)]
    pub disabled_kinds: Vec<String>,
}

/// Push subscription response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionResponse {
    pub id: String,
    /// Endpoint with the path masked
    pub endpoint: String,
    pub user_agent: Option<String>,
    pub active: bool,
    pub failure_count: i32,
    pub last_success_at: Option<String>,
    pub created_at: String,
}

/// Push preferences response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPreferences {
    pub enabled: bool,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
    pub disabled_kinds: Vec<NotificationKind>,
}

impl Default for PushPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
            disabled_kinds: vec![],
        }
    }
}

impl From<push_preference::Model> for PushPreferences {
    fn from(model: push_preference::Model) -> Self {
        let disabled_kinds = model
            .disabled_kinds
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().and_then(NotificationKind::parse))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            enabled: model.enabled,
            quiet_hours_start: model.quiet_hours_start,
            quiet_hours_end: model.quiet_hours_end,
            disabled_kinds,
        }
    }
}

impl PushPreferences {
    /// Why a notification of `kind` must not be pushed at local time `now`, if at all.
    #[must_use]
    pub fn skip_reason(&self, kind: NotificationKind, now: NaiveTime) -> Option<DeliveryStatus> {
        if !self.enabled || self.disabled_kinds.contains(&kind) {
            return Some(DeliveryStatus::SkippedOptOut);
        }
        let quiet = QuietHours::parse(
            self.quiet_hours_start.as_deref(),
            self.quiet_hours_end.as_deref(),
        )
        .ok()
        .flatten();
        match quiet {
            Some(window) if window.contains(now) => Some(DeliveryStatus::SkippedQuietHours),
            _ => None,
        }
    }
}

/// Response for push notification configuration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfigResponse {
    /// Whether push notifications are available
    pub available: bool,
    /// VAPID public key for subscription
    pub public_key: Option<String>,
}

/// Counts from one fan-out run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub gone: usize,
}

struct Attempted {
    status: DeliveryStatus,
    outcome: SendOutcome,
    attempts: u32,
}

/// Push notification service.
#[derive(Clone)]
pub struct PushNotificationService {
    repo: PushSubscriptionRepository,
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    sender: Option<Arc<dyn PushSender>>,
    public_key: Option<String>,
    retry: RetryPolicy,
    id_gen: IdGenerator,
}

impl PushNotificationService {
    /// Create a new push notification service. Delivery is off until a sender is set.
    #[must_use]
    pub fn new(
        repo: PushSubscriptionRepository,
        notification_repo: NotificationRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            repo,
            notification_repo,
            user_repo,
            sender: None,
            public_key: None,
            retry: RetryPolicy::default(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Enable delivery through `sender`, advertising `public_key` to browsers.
    pub fn set_sender(&mut self, sender: Arc<dyn PushSender>, public_key: String) {
        self.sender = Some(sender);
        self.public_key = Some(public_key);
    }

    /// Override the retry policy.
    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    /// Check if push notifications are enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Public configuration for clients.
    #[must_use]
    pub fn config(&self) -> PushConfigResponse {
        PushConfigResponse {
            available: self.is_enabled(),
            public_key: self.public_key.clone(),
        }
    }

    /// Register or refresh a browser subscription.
    pub async fn subscribe(
        &self,
        user_id: &str,
        input: SubscribeInput,
        user_agent: Option<String>,
    ) -> AppResult<PushSubscriptionResponse> {
        input.validate()?;
        let endpoint = url::Url::parse(&input.endpoint)
            .map_err(|e| AppError::Validation(format!("invalid endpoint: {e}")))?;
        if endpoint.scheme() != "https" {
            return Err(AppError::Validation("endpoint must use https".to_string()));
        }

        let subscription = match self.repo.find_by_endpoint(&input.endpoint).await? {
            Some(existing) if existing.user_id != user_id => {
                return Err(AppError::Conflict(
                    "Endpoint is registered to another user".to_string(),
                ));
            }
            Some(existing) => {
                let mut active: push_subscription::ActiveModel = existing.into();
                active.p256dh = Set(input.keys.p256dh);
                active.auth = Set(input.keys.auth);
                active.user_agent = Set(user_agent);
                active.failure_count = Set(0);
                active.disabled_at = Set(None);
                self.repo.update(active).await?
            }
            None => {
                self.repo
                    .create(push_subscription::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        user_id: Set(user_id.to_string()),
                        endpoint: Set(input.endpoint),
                        p256dh: Set(input.keys.p256dh),
                        auth: Set(input.keys.auth),
                        user_agent: Set(user_agent),
                        failure_count: Set(0),
                        last_failure_at: Set(None),
                        last_success_at: Set(None),
                        disabled_at: Set(None),
                        created_at: Set(Utc::now().fixed_offset()),
                    })
                    .await?
            }
        };

        tracing::debug!(user_id = %user_id, subscription_id = %subscription.id, "Push subscription registered");
        Ok(to_response(subscription))
    }

    /// Remove a subscription by endpoint.
    pub async fn unsubscribe(&self, user_id: &str, endpoint: &str) -> AppResult<()> {
        let subscription = self
            .repo
            .find_by_endpoint(endpoint)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;
        self.repo.delete(&subscription.id).await?;
        Ok(())
    }

    /// Subscriptions of a user.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<PushSubscriptionResponse>> {
        Ok(self
            .repo
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(to_response)
            .collect())
    }

    /// Stored preferences, or the defaults.
    pub async fn preferences(&self, user_id: &str) -> AppResult<PushPreferences> {
        Ok(self
            .repo
            .find_preference(user_id)
            .await?
            .map(PushPreferences::from)
            .unwrap_or_default())
    }

    /// Replace preferences.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        input: UpdatePreferencesInput,
    ) -> AppResult<PushPreferences> {
        QuietHours::parse(
            input.quiet_hours_start.as_deref(),
            input.quiet_hours_end.as_deref(),
        )?;
        let mut kinds: Vec<NotificationKind> = Vec::with_capacity(input.disabled_kinds.len());
        for name in &input.disabled_kinds {
            let kind = NotificationKind::parse(name).ok_or_else(|| {
                AppError::Validation(format!("unknown notification kind {name:?}"))
            })?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        let prefs = PushPreferences {
            enabled: input.enabled,
            quiet_hours_start: input.quiet_hours_start,
            quiet_hours_end: input.quiet_hours_end,
            disabled_kinds: kinds,
        };

        self.repo
            .upsert_preference(push_preference::ActiveModel {
                user_id: Set(user_id.to_string()),
                enabled: Set(prefs.enabled),
                quiet_hours_start: Set(prefs.quiet_hours_start.clone()),
                quiet_hours_end: Set(prefs.quiet_hours_end.clone()),
                disabled_kinds: Set(serde_json::json!(
                    prefs.disabled_kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>()
                )),
                updated_at: Set(Utc::now().fixed_offset()),
            })
            .await?;

        Ok(prefs)
    }

    /// Push a notification to every enabled subscription of its recipient.
    pub async fn deliver_notification(&self, notification_id: &str) -> AppResult<DeliveryReport> {
        let mut report = DeliveryReport::default();
        let Some(ref sender) = self.sender else {
            return Ok(report);
        };
        let Some(notification) = self.notification_repo.find_by_id(notification_id).await? else {
            tracing::debug!(notification_id = %notification_id, "Notification vanished before push");
            return Ok(report);
        };
        let subscriptions = self.repo.find_enabled_by_user(&notification.user_id).await?;
        if subscriptions.is_empty() {
            return Ok(report);
        }

        let user = self.user_repo.get_by_id(&notification.user_id).await?;
        let tz: Tz = user.timezone.parse().unwrap_or(Tz::UTC);
        let prefs = self.preferences(&user.id).await?;

        if let Some(skip) = prefs.skip_reason(notification.kind, local_time(tz, Utc::now())) {
            for subscription in &subscriptions {
                self.log(
                    &message_id(&notification.id, &subscription.id),
                    subscription,
                    &notification.id,
                    skip,
                    None,
                    0,
                )
                .await?;
                report.skipped += 1;
            }
            return Ok(report);
        }

        let (title, body, url) = decode_metadata(&notification)?.render();
        let payload = serde_json::to_vec(&PushPayload {
            title,
            body,
            kind: notification.kind,
            url,
            notification_id: notification.id.clone(),
        })
        .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {e}")))?;

        for subscription in subscriptions {
            let message_id = message_id(&notification.id, &subscription.id);
            let already_sent = self
                .repo
                .find_delivery(&message_id)
                .await?
                .is_some_and(|log| log.status == DeliveryStatus::Sent);
            if already_sent {
                report.skipped += 1;
                continue;
            }

            let attempted = self.send_with_retry(sender.as_ref(), &subscription, &payload).await;
            match attempted.status {
                DeliveryStatus::Sent => report.sent += 1,
                DeliveryStatus::Gone => report.gone += 1,
                _ => report.failed += 1,
            }

            self.apply_outcome(&subscription, attempted.status).await?;
            self.log(
                &message_id,
                &subscription,
                &notification.id,
                attempted.status,
                Some(&attempted.outcome),
                attempted.attempts,
            )
            .await?;
        }

        Ok(report)
    }

    async fn send_with_retry(
        &self,
        sender: &dyn PushSender,
        subscription: &push_subscription::Model,
        payload: &[u8],
    ) -> Attempted {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = sender.send(subscription, payload, PUSH_TTL_SECS).await;
            let status = classify(&outcome);

            if status == DeliveryStatus::Retryable && self.retry.should_retry(attempts) {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    attempt = attempts,
                    ?outcome,
                    "Push send failed, retrying"
                );
                tokio::time::sleep(self.retry.delay_after(attempts)).await;
                continue;
            }

            return Attempted {
                status,
                outcome,
                attempts,
            };
        }
    }

    async fn apply_outcome(
        &self,
        subscription: &push_subscription::Model,
        status: DeliveryStatus,
    ) -> AppResult<()> {
        let now = Utc::now().fixed_offset();
        match subscription_update(subscription.failure_count, status) {
            SubscriptionUpdate::Succeeded => {
                let mut active: push_subscription::ActiveModel = subscription.clone().into();
                active.failure_count = Set(0);
                active.last_success_at = Set(Some(now));
                self.repo.update(active).await?;
            }
            SubscriptionUpdate::Remove => {
                self.repo.delete(&subscription.id).await?;
                tracing::info!(subscription_id = %subscription.id, "Push subscription gone, removed");
            }
            SubscriptionUpdate::Failed { failures, disable } => {
                let mut active: push_subscription::ActiveModel = subscription.clone().into();
                active.failure_count = Set(failures);
                active.last_failure_at = Set(Some(now));
                if disable {
                    active.disabled_at = Set(Some(now));
                    tracing::warn!(subscription_id = %subscription.id, failures, "Push subscription disabled");
                }
                self.repo.update(active).await?;
            }
            SubscriptionUpdate::Unchanged => {}
        }
        Ok(())
    }

    async fn log(
        &self,
        message_id: &str,
        subscription: &push_subscription::Model,
        notification_id: &str,
        status: DeliveryStatus,
        outcome: Option<&SendOutcome>,
        attempt: u32,
    ) -> AppResult<()> {
        let (http_status, error) = match outcome {
            Some(SendOutcome::Response { status, error }) => (Some(i32::from(*status)), error.clone()),
            Some(SendOutcome::Transport(e) | SendOutcome::Invalid(e)) => (None, Some(e.clone())),
            None => (None, None),
        };

        self.repo
            .record_delivery(push_delivery_log::ActiveModel {
                id: Set(self.id_gen.generate()),
                message_id: Set(message_id.to_string()),
                subscription_id: Set(subscription.id.clone()),
                user_id: Set(subscription.user_id.clone()),
                notification_id: Set(Some(notification_id.to_string())),
                status: Set(status),
                http_status: Set(http_status),
                error: Set(error),
                attempt: Set(attempt as i32),
                created_at: Set(Utc::now().fixed_offset()),
            })
            .await
    }
}

fn to_response(model: push_subscription::Model) -> PushSubscriptionResponse {
    // Mask the endpoint (show only the push service host)
    let masked_endpoint = url::Url::parse(&model.endpoint)
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("https://{h}/***")))
        .unwrap_or_else(|| "***".to_string());

    PushSubscriptionResponse {
        id: model.id,
        endpoint: masked_endpoint,
        user_agent: model.user_agent,
        active: model.disabled_at.is_none(),
        failure_count: model.failure_count,
        last_success_at: model.last_success_at.map(|dt| dt.to_rfc3339()),
        created_at: model.created_at.to_rfc3339(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::notification::NotificationMetadata;
    use habitgrid_db::entities::{notification, user};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(start: &str, end: &str) -> QuietHours {
        QuietHours::parse(Some(start), Some(end)).unwrap().unwrap()
    }

    #[test]
    fn test_quiet_hours_same_day() {
        let w = window("09:00", "17:00");
        assert!(!w.contains(t(8, 59)));
        assert!(w.contains(t(9, 0)));
        assert!(w.contains(t(16, 59)));
        assert!(!w.contains(t(17, 0)));
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let w = window("22:00", "07:00");
        assert!(w.contains(t(22, 0)));
        assert!(w.contains(t(23, 59)));
        assert!(w.contains(t(0, 0)));
        assert!(w.contains(t(6, 59)));
        assert!(!w.contains(t(7, 0)));
        assert!(!w.contains(t(12, 0)));
        assert!(!w.contains(t(21, 59)));
    }

    #[test]
    fn test_quiet_hours_equal_bounds_never_quiet() {
        let w = window("08:00", "08:00");
        assert!(!w.contains(t(8, 0)));
        assert!(!w.contains(t(20, 0)));
    }

    #[test]
    fn test_quiet_hours_need_both_bounds() {
        assert!(QuietHours::parse(None, None).unwrap().is_none());
        assert!(QuietHours::parse(Some("22:00"), None).is_err());
        assert!(QuietHours::parse(None, Some("07:00")).is_err());
        assert!(QuietHours::parse(Some("25:00"), Some("07:00")).is_err());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), DeliveryStatus::Sent);
        assert_eq!(classify_status(201), DeliveryStatus::Sent);
        assert_eq!(classify_status(404), DeliveryStatus::Gone);
        assert_eq!(classify_status(410), DeliveryStatus::Gone);
        assert_eq!(classify_status(429), DeliveryStatus::Retryable);
        assert_eq!(classify_status(500), DeliveryStatus::Retryable);
        assert_eq!(classify_status(503), DeliveryStatus::Retryable);
        assert_eq!(classify_status(400), DeliveryStatus::Rejected);
        assert_eq!(classify_status(401), DeliveryStatus::Rejected);
        assert_eq!(classify_status(413), DeliveryStatus::Rejected);
        assert_eq!(
            classify(&SendOutcome::Transport("timeout".to_string())),
            DeliveryStatus::Retryable
        );
        assert_eq!(
            classify(&SendOutcome::Invalid("bad key".to_string())),
            DeliveryStatus::Rejected
        );
    }

    #[test]
    fn test_message_id_is_stable() {
        let a = message_id("n1", "s1");
        assert_eq!(a, message_id("n1", "s1"));
        assert_ne!(a, message_id("n1", "s2"));
        assert_eq!(a.len(), 64);
        // the separator keeps ("n1:", "s") and ("n1", ":s") apart from ("n1", "s")
        assert_ne!(message_id("n", "1s"), message_id("n1", "s"));
    }

    #[test]
    fn test_retry_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_skip_reason() {
        let mut prefs = PushPreferences::default();
        assert_eq!(prefs.skip_reason(NotificationKind::Like, t(12, 0)), None);

        prefs.disabled_kinds = vec![NotificationKind::Like];
        assert_eq!(
            prefs.skip_reason(NotificationKind::Like, t(12, 0)),
            Some(DeliveryStatus::SkippedOptOut)
        );
        assert_eq!(prefs.skip_reason(NotificationKind::Follow, t(12, 0)), None);

        prefs.quiet_hours_start = Some("22:00".to_string());
        prefs.quiet_hours_end = Some("07:00".to_string());
        assert_eq!(
            prefs.skip_reason(NotificationKind::Follow, t(23, 0)),
            Some(DeliveryStatus::SkippedQuietHours)
        );

        prefs.enabled = false;
        assert_eq!(
            prefs.skip_reason(NotificationKind::Follow, t(12, 0)),
            Some(DeliveryStatus::SkippedOptOut)
        );
    }

    struct ScriptedSender {
        outcomes: Mutex<VecDeque<SendOutcome>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSender {
        fn new(outcomes: Vec<SendOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PushSender for ScriptedSender {
        async fn send(&self, _: &push_subscription::Model, _: &[u8], _: u32) -> SendOutcome {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SendOutcome::Response {
                    status: 201,
                    error: None,
                })
        }
    }

    fn subscription(failure_count: i32) -> push_subscription::Model {
        push_subscription::Model {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            endpoint: "https://push.example.com/abc".to_string(),
            p256dh: "key".to_string(),
            auth: "auth".to_string(),
            user_agent: None,
            failure_count,
            last_failure_at: None,
            last_success_at: None,
            disabled_at: None,
            created_at: Utc::now().into(),
        }
    }

    fn stored_notification() -> notification::Model {
        let metadata = NotificationMetadata::Follow {
            username: "bob".to_string(),
        };
        notification::Model {
            id: "n1".to_string(),
            user_id: "u1".to_string(),
            actor_id: Some("b1".to_string()),
            kind: NotificationKind::Follow,
            entity_type: "user".to_string(),
            entity_key: "b1".to_string(),
            metadata: serde_json::to_value(metadata).unwrap(),
            is_read: false,
            created_at: Utc::now().into(),
        }
    }

    fn recipient() -> user::Model {
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

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn service(push_db: MockDatabase, sender: Arc<ScriptedSender>) -> PushNotificationService {
        service_on(Arc::new(push_db.into_connection()), sender)
    }

    fn service_on(
        push_db: Arc<DatabaseConnection>,
        sender: Arc<ScriptedSender>,
    ) -> PushNotificationService {
        let notification_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored_notification()]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[recipient()]])
            .into_connection();
        let mut service = PushNotificationService::new(
            PushSubscriptionRepository::new(push_db),
            NotificationRepository::new(Arc::new(notification_db)),
            UserRepository::new(Arc::new(user_db)),
        );
        service.set_sender(sender, "public-key".to_string());
        service.set_retry_policy(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            multiplier: 2.0,
        });
        service
    }

    #[tokio::test]
    async fn test_deliver_retries_then_counts_failure() {
        let sender = ScriptedSender::new(vec![
            SendOutcome::Response {
                status: 503,
                error: None,
            },
            SendOutcome::Transport("reset".to_string()),
            SendOutcome::Response {
                status: 429,
                error: None,
            },
        ]);
        let mut failed = subscription(4);
        failed.failure_count = 5;
        failed.disabled_at = Some(Utc::now().into());

        let push_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[subscription(4)]])
                .append_query_results([Vec::<push_preference::Model>::new()])
                .append_query_results([Vec::<push_delivery_log::Model>::new()])
                .append_query_results([[failed]])
                .append_exec_results([exec_ok()])
                .into_connection(),
        );

        let service = service_on(push_db.clone(), sender.clone());
        let report = service.deliver_notification("n1").await.unwrap();

        assert_eq!(sender.calls(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 0);

        // the fifth consecutive failure disables the subscription
        drop(service);
        let update = subscription_update_sql(push_db);
        let set = set_clause(&update);
        assert!(set.contains("disabled_at"), "{update}");
        assert!(set.contains("last_failure_at"), "{update}");
        assert!(update.contains("Int(Some(5))"), "{update}");
    }

    #[tokio::test]
    async fn test_deliver_success_resets_failures() {
        let sender = ScriptedSender::new(vec![]);
        let push_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[subscription(3)]])
                .append_query_results([Vec::<push_preference::Model>::new()])
                .append_query_results([Vec::<push_delivery_log::Model>::new()])
                .append_query_results([[subscription(0)]])
                .append_exec_results([exec_ok()])
                .into_connection(),
        );

        let service = service_on(push_db.clone(), sender.clone());
        let report = service.deliver_notification("n1").await.unwrap();
        assert_eq!(report.sent, 1);

        drop(service);
        let update = subscription_update_sql(push_db);
        let set = set_clause(&update);
        assert!(set.contains("failure_count"), "{update}");
        assert!(set.contains("last_success_at"), "{update}");
        assert!(!set.contains("disabled_at"), "{update}");
        assert!(update.contains("Int(Some(0))"), "{update}");
    }

    fn subscription_update_sql(push_db: Arc<DatabaseConnection>) -> String {
        Arc::try_unwrap(push_db)
            .unwrap()
            .into_transaction_log()
            .iter()
            .map(|txn| format!("{txn:?}"))
            .find(|sql| sql.contains("UPDATE"))
            .unwrap()
    }

    fn set_clause(sql: &str) -> &str {
        let start = sql.find(" SET ").unwrap();
        let end = sql.find(" WHERE ").unwrap();
        &sql[start..end]
    }

    #[test]
    fn test_subscription_update() {
        assert_eq!(
            subscription_update(3, DeliveryStatus::Sent),
            SubscriptionUpdate::Succeeded
        );
        assert_eq!(
            subscription_update(3, DeliveryStatus::Retryable),
            SubscriptionUpdate::Failed {
                failures: 4,
                disable: false
            }
        );
        assert_eq!(
            subscription_update(4, DeliveryStatus::Retryable),
            SubscriptionUpdate::Failed {
                failures: 5,
                disable: true
            }
        );
        assert_eq!(
            subscription_update(4, DeliveryStatus::Rejected),
            SubscriptionUpdate::Failed {
                failures: 5,
                disable: true
            }
        );
        assert_eq!(
            subscription_update(0, DeliveryStatus::Gone),
            SubscriptionUpdate::Remove
        );
        assert_eq!(
            subscription_update(2, DeliveryStatus::SkippedQuietHours),
            SubscriptionUpdate::Unchanged
        );
    }

    #[tokio::test]
    async fn test_deliver_gone_removes_subscription() {
        let sender = ScriptedSender::new(vec![SendOutcome::Response {
            status: 410,
            error: None,
        }]);
        let push_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[subscription(0)]])
            .append_query_results([Vec::<push_preference::Model>::new()])
            .append_query_results([Vec::<push_delivery_log::Model>::new()])
            .append_exec_results([exec_ok(), exec_ok()]);

        let service = service(push_db, sender.clone());
        let report = service.deliver_notification("n1").await.unwrap();

        assert_eq!(sender.calls(), 1);
        assert_eq!(report.gone, 1);
    }

    #[tokio::test]
    async fn test_deliver_skips_already_sent() {
        let sender = ScriptedSender::new(vec![]);
        let sent_log = push_delivery_log::Model {
            id: "d1".to_string(),
            message_id: message_id("n1", "s1"),
            subscription_id: "s1".to_string(),
            user_id: "u1".to_string(),
            notification_id: Some("n1".to_string()),
            status: DeliveryStatus::Sent,
            http_status: Some(201),
            error: None,
            attempt: 1,
            created_at: Utc::now().into(),
        };
        let push_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[subscription(0)]])
            .append_query_results([Vec::<push_preference::Model>::new()])
            .append_query_results([[sent_log]]);

        let service = service(push_db, sender.clone());
        let report = service.deliver_notification("n1").await.unwrap();

        assert_eq!(sender.calls(), 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_deliver_opted_out_logs_skip() {
        let sender = ScriptedSender::new(vec![]);
        let prefs = push_preference::Model {
            user_id: "u1".to_string(),
            enabled: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
            disabled_kinds: serde_json::json!(["follow"]),
            updated_at: Utc::now().into(),
        };
        let push_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[subscription(0)]])
            .append_query_results([[prefs]])
            .append_exec_results([exec_ok()]);

        let service = service(push_db, sender.clone());
        let report = service.deliver_notification("n1").await.unwrap();

        assert_eq!(sender.calls(), 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_foreign_endpoint() {
        let mut foreign = subscription(0);
        foreign.user_id = "someone-else".to_string();
        let push_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[foreign]]);
        let service = service(push_db, ScriptedSender::new(vec![]));

        let result = service
            .subscribe(
                "u1",
                SubscribeInput {
                    endpoint: "https://push.example.com/abc".to_string(),
                    keys: SubscriptionKeys {
                        p256dh: "key".to_string(),
                        auth: "auth".to_string(),
                    },
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_subscribe_requires_https() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres),
            ScriptedSender::new(vec![]),
        );
        let result = service
            .subscribe(
                "u1",
                SubscribeInput {
                    endpoint: "http://push.example.com/abc".to_string(),
                    keys: SubscriptionKeys {
                        p256dh: "key".to_string(),
                        auth: "auth".to_string(),
                    },
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_preferences_validates() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres),
            ScriptedSender::new(vec![]),
        );
        let result = service
            .update_preferences(
                "u1",
                UpdatePreferencesInput {
                    enabled: true,
                    quiet_hours_start: Some("22:00".to_string()),
                    quiet_hours_end: None,
                    disabled_kinds: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service
            .update_preferences(
                "u1",
                UpdatePreferencesInput {
                    enabled: true,
                    quiet_hours_start: None,
                    quiet_hours_end: None,
                    disabled_kinds: vec!["mention".to_string()],
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_payload_shape() {
        let payload = PushPayload {
            title: "New follower".to_string(),
            body: "@bob started following you".to_string(),
            kind: NotificationKind::Follow,
            url: "/@bob".to_string(),
            notification_id: "n1".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "follow");
        assert_eq!(json["notificationId"], "n1");
    }
}
