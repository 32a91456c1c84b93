//! API endpoints.

mod activities;
mod auth;
mod following;
mod likes;
mod notifications;
mod push;
mod stories;
mod summaries;
mod tiles;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/users", users::router())
        .nest("/activities", activities::router())
        .nest("/tiles", tiles::router())
        .nest("/following", following::router())
        .nest("/likes", likes::router())
        .nest("/summaries", summaries::router())
        .nest("/stories", stories::router())
        .nest("/notifications", notifications::router())
        .nest("/push", push::router())
}
