//! User service: accounts, sessions and profile settings.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use habitgrid_common::{AppError, AppResult, IdGenerator, parse_timezone};
use habitgrid_db::{entities::user, repositories::UserRepository};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use std::sync::LazyLock;
use validator::Validate;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,32}$").expect("valid username regex"));

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for creating a new account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    #[validate(regex(path = *USERNAME_RE))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(email)]
    pub email: Option<String>,

    pub timezone: Option<String>,
}

/// Input for updating the current user's settings.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(length(max = 64))]
    pub display_name: Option<String>,

    pub timezone: Option<String>,

    pub is_private: Option<bool>,

    pub reminder_enabled: Option<bool>,

    #[validate(email)]
    pub email: Option<String>,
}

/// A signed-in user with their bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: user::Model,
    pub token: String,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an account and open a session for it.
    pub async fn signup(&self, input: SignupInput) -> AppResult<Session> {
        input.validate()?;

        let timezone = input.timezone.unwrap_or_else(|| "UTC".to_string());
        parse_timezone(&timezone)?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            email: Set(input.email),
            password_hash: Set(password_hash),
            token: Set(Some(token.clone())),
            display_name: Set(None),
            timezone: Set(timezone),
            is_private: Set(false),
            reminder_enabled: Set(true),
            created_at: Set(Utc::now().fixed_offset()),
            updated_at: Set(None),
        };

        // The unique index still catches a concurrent signup for the same name.
        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

        Ok(Session { user, token })
    }

    /// Check credentials and return a session, issuing a token if none is active.
    pub async fn signin(&self, username: &str, password: &str) -> AppResult<Session> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        if let Some(token) = user.token.clone() {
            return Ok(Session { user, token });
        }

        let token = self.id_gen.generate_token();
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(token.clone()));
        let user = self.user_repo.update(active).await?;

        Ok(Session { user, token })
    }

    /// Revoke the user's token.
    pub async fn signout(&self, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = user.into();
        active.token = Set(None);
        active.updated_at = Set(Some(Utc::now().fixed_offset()));
        self.user_repo.update(active).await?;
        Ok(())
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Update profile settings.
    pub async fn update(&self, id: &str, input: UpdateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        if let Some(ref timezone) = input.timezone {
            parse_timezone(timezone)?;
        }

        let user = self.user_repo.get_by_id(id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(display_name) = input.display_name {
            let trimmed = display_name.trim();
            active.display_name = Set((!trimmed.is_empty()).then(|| trimmed.to_string()));
        }
        if let Some(timezone) = input.timezone {
            active.timezone = Set(timezone);
        }
        if let Some(is_private) = input.is_private {
            active.is_private = Set(is_private);
        }
        if let Some(reminder_enabled) = input.reminder_enabled {
            active.reminder_enabled = Set(reminder_enabled);
        }
        if let Some(email) = input.email {
            active.email = Set((!email.is_empty()).then_some(email));
        }
        active.updated_at = Set(Some(Utc::now().fixed_offset()));

        self.user_repo.update(active).await
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str, password_hash: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: None,
            password_hash: password_hash.to_string(),
            token: Some("existing-token".to_string()),
            display_name: None,
            timezone: "UTC".to_string(),
            is_private: false,
            reminder_enabled: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn service(db: MockDatabase) -> UserService {
        UserService::new(UserRepository::new(Arc::new(db.into_connection())))
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "not-a-hash").is_err());
    }

    #[test]
    fn test_signup_input_validation() {
        let input = SignupInput {
            username: "has space".to_string(),
            password: "password123".to_string(),
            email: None,
            timezone: None,
        };
        assert!(input.validate().is_err());

        let input = SignupInput {
            username: "alice".to_string(),
            password: "short".to_string(),
            email: None,
            timezone: None,
        };
        assert!(input.validate().is_err());

        let input = SignupInput {
            username: "alice_01".to_string(),
            password: "password123".to_string(),
            email: Some("alice@example.com".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
        };
        assert!(input.validate().is_ok());
    }

    #[tokio::test]
    async fn test_signup_rejects_unknown_timezone() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = service
            .signup(SignupInput {
                username: "alice".to_string(),
                password: "password123".to_string(),
                email: None,
                timezone: Some("Mars/Olympus".to_string()),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_signup_username_taken() {
        let existing = create_test_user("u1", "Alice", "hash");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]),
        );
        let result = service
            .signup(SignupInput {
                username: "alice".to_string(),
                password: "password123".to_string(),
                email: None,
                timezone: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_signin_returns_existing_token() {
        let hash = hash_password("password123").unwrap();
        let user = create_test_user("u1", "alice", &hash);
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let session = service.signin("alice", "password123").await.unwrap();
        assert_eq!(session.token, "existing-token");
        assert_eq!(session.user.id, "u1");
    }

    #[tokio::test]
    async fn test_signin_wrong_password() {
        let hash = hash_password("password123").unwrap();
        let user = create_test_user("u1", "alice", &hash);
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let result = service.signin("alice", "nope-nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_authenticate_by_token_not_found() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );
        let result = service.authenticate_by_token("bogus").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_update_rejects_bad_timezone_before_query() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = service
            .update(
                "u1",
                UpdateUserInput {
                    timezone: Some("Nowhere/City".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_sets_privacy() {
        let user = create_test_user("u1", "alice", "hash");
        let mut updated = user.clone();
        updated.is_private = true;

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .append_query_results([[updated]]),
        );
        let result = service
            .update(
                "u1",
                UpdateUserInput {
                    is_private: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_private);
    }
}
