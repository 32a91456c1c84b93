//! Business logic services.

#![allow(missing_docs)]

pub mod activity;
pub mod cron;
pub mod email;
pub mod following;
pub mod jobs;
pub mod like;
pub mod media;
pub mod notification;
pub mod push_notification;
pub mod reminder;
pub mod story;
pub mod streak;
pub mod summary;
pub mod tile;
pub mod user;

pub use activity::{ActivityService, SaveActivityInput, SaveOutcome};
pub use cron::CronLockService;
pub use email::{EmailSender, EmailService, SmtpEmailSender};
pub use following::{FollowCounts, FollowEntry, FollowingService, Relation};
pub use jobs::{Job, JobSender, JobService, JobWorkerContext};
pub use like::{LikeService, LikeState, Liker};
pub use notification::{ListNotificationsInput, NotificationMetadata, NotificationService};
pub use push_notification::{
    DeliveryReport, PushConfigResponse, PushNotificationService, PushPreferences, PushSender,
    PushSubscriptionResponse, SubscribeInput, UpdatePreferencesInput, VapidConfig, WebPushSender,
};
pub use reminder::{ReminderReport, ReminderService};
pub use story::StoryService;
pub use streak::{StreakService, StreakState};
pub use summary::{DailySummary, SummaryService};
pub use tile::{
    CreateCustomTileInput, LayoutEntry, TileService, TileSize, UpdateCustomTileInput,
};
pub use user::{Session, SignupInput, UpdateUserInput, UserService};
