//! Database entities.

#![allow(missing_docs)]

pub mod activity;
pub mod cron_job_log;
pub mod custom_tile;
pub mod follow_counter;
pub mod follow_edge_by_followee;
pub mod follow_edge_by_follower;
pub mod notification;
pub mod notification_dedupe;
pub mod push_delivery_log;
pub mod push_preference;
pub mod push_subscription;
pub mod story;
pub mod streak;
pub mod summary_like;
pub mod tile_layout;
pub mod user;

pub use activity::Entity as Activity;
pub use cron_job_log::Entity as CronJobLog;
pub use custom_tile::Entity as CustomTile;
pub use follow_counter::Entity as FollowCounter;
pub use follow_edge_by_followee::Entity as FollowEdgeByFollowee;
pub use follow_edge_by_follower::Entity as FollowEdgeByFollower;
pub use notification::Entity as Notification;
pub use notification_dedupe::Entity as NotificationDedupe;
pub use push_delivery_log::Entity as PushDeliveryLog;
pub use push_preference::Entity as PushPreference;
pub use push_subscription::Entity as PushSubscription;
pub use story::Entity as Story;
pub use streak::Entity as Streak;
pub use summary_like::Entity as SummaryLike;
pub use tile_layout::Entity as TileLayout;
pub use user::Entity as User;
