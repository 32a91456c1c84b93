//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use habitgrid_core::{
    ActivityService, FollowingService, LikeService, NotificationService, PushNotificationService,
    StoryService, SummaryService, TileService, UserService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub activity_service: ActivityService,
    pub tile_service: TileService,
    pub following_service: FollowingService,
    pub like_service: LikeService,
    pub summary_service: SummaryService,
    pub story_service: StoryService,
    pub notification_service: NotificationService,
    pub push_service: PushNotificationService,
    /// Largest accepted story upload, in bytes.
    pub max_upload_bytes: usize,
}

/// Bearer token from the `Authorization` header.
fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware.
///
/// Attaches the user to the request extensions when the token is valid.
/// Routes that need a user reject the request through [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        match state.user_service.authenticate_by_token(token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => tracing::debug!(error = %e, "Bearer token rejected"),
        }
    }

    next.run(req).await
}
