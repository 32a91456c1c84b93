//! Authentication and account endpoints.

use axum::{Json, Router, extract::State, middleware, routing::post};
use habitgrid_common::AppResult;
use habitgrid_core::{SignupInput, UpdateUserInput};
use habitgrid_db::entities::user;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::AuthUser, middleware::AppState, rate_limit::rate_limit_auth_middleware,
    response::ApiResponse,
};

/// A user as shown to other users.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub timezone: String,
    pub is_private: bool,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            display_name: u.display_name,
            timezone: u.timezone,
            is_private: u.is_private,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// The signed-in user, including private settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub email: Option<String>,
    pub reminder_enabled: bool,
}

impl From<user::Model> for MeResponse {
    fn from(u: user::Model) -> Self {
        let email = u.email.clone();
        let reminder_enabled = u.reminder_enabled;
        Self {
            user: u.into(),
            email,
            reminder_enabled,
        }
    }
}

/// Session response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub user: MeResponse,
}

/// Sign in request.
#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let session = state.user_service.signup(req).await?;
    Ok(ApiResponse::ok(SessionResponse {
        token: session.token,
        user: session.user.into(),
    }))
}

async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    req.validate()?;
    let session = state
        .user_service
        .signin(&req.username, &req.password)
        .await?;
    Ok(ApiResponse::ok(SessionResponse {
        token: session.token,
        user: session.user.into(),
    }))
}

async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<()>> {
    state.user_service.signout(&user.id).await?;
    Ok(ApiResponse::ok(()))
}

async fn me(AuthUser(user): AuthUser) -> ApiResponse<MeResponse> {
    ApiResponse::ok(user.into())
}

async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserInput>,
) -> AppResult<ApiResponse<MeResponse>> {
    let updated = state.user_service.update(&user.id, req).await?;
    Ok(ApiResponse::ok(updated.into()))
}

pub fn router() -> Router<AppState> {
    let credentials = Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route_layer(middleware::from_fn(rate_limit_auth_middleware));

    Router::new()
        .merge(credentials)
        .route("/signout", post(signout))
        .route("/i", post(me))
        .route("/i/update", post(update_me))
}
