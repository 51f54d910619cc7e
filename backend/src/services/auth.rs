//! Authentication service for registration, login and token issuing

use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::Claims;
use crate::services::user::{CreateUserInput, User, UserService};
use shared::UserRole;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
}

/// Login credentials
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Self-service registration
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Option<UserRole>,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Credentials row used for login
#[derive(Debug, FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: UserRole,
    active: bool,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Register a new account.
    ///
    /// The very first account may take any role so a fresh installation can
    /// create its admin; after that, self-registration only creates staff.
    pub async fn register(&self, input: RegisterInput) -> AppResult<User> {
        input.validate()?;

        let users = UserService::new(self.db.clone());
        let role = input.role.unwrap_or(UserRole::Staff);
        if role != UserRole::Staff && users.count().await? > 0 {
            tracing::warn!(email = %input.email, role = role.as_str(), "Privileged self-registration refused");
            return Err(AppError::InsufficientPermissions);
        }

        users
            .create(CreateUserInput {
                email: input.email,
                password: input.password,
                name: input.name,
                role: Some(role),
            })
            .await
    }

    /// Authenticate user with email and password
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthTokens> {
        input.validate()?;

        let user = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, role, active
            FROM users
            WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL
            "#,
        )
        .bind(input.email.trim())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !user.active {
            tracing::warn!(user_id = %user.id, "Login attempt on disabled account");
            return Err(AppError::InvalidCredentials);
        }

        let valid = verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.issue_token(user.id, &user.email, user.role)
    }

    /// Current user's profile
    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        UserService::new(self.db.clone()).get(user_id).await
    }

    /// Sign an access token for a user
    pub fn issue_token(&self, user_id: Uuid, email: &str, role: UserRole) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthTokens {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_token;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_issued_token_decodes_to_same_user() {
        let config = Config::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();
        let service = AuthService::new(pool, &config);

        let user_id = Uuid::new_v4();
        let tokens = service
            .issue_token(user_id, "roaster@coffeeshop.com", UserRole::Manager)
            .unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 3600);

        let claims = decode_token(&tokens.access_token, &config.jwt.secret).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, UserRole::Manager);
        assert_eq!(claims.exp - claims.iat, 3600);
    }
}
