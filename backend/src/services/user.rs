//! User account service

use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::{forbidden_user_fields, PaginatedResponse, Pagination, UserRole};

/// User account service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// User account without credentials
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    pub role: Option<UserRole>,
}

/// Input for updating a user
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 2, max = 150))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

impl UpdateUserInput {
    fn requested_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.email.is_some() {
            fields.push("email");
        }
        if self.password.is_some() {
            fields.push("password");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        if self.role.is_some() {
            fields.push("role");
        }
        if self.active.is_some() {
            fields.push("active");
        }
        fields
    }
}

/// Filters for listing users
#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

impl UserFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE deleted_at IS NULL");
        if let Some(role) = self.role {
            qb.push(" AND role = ").push_bind(role);
        }
        if let Some(active) = self.active {
            qb.push(" AND active = ").push_bind(active);
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, role, active, created_at, updated_at";

pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a user account
    pub async fn create(&self, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;
        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES (LOWER($1), $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.email.trim())
        .bind(&password_hash)
        .bind(input.name.trim())
        .bind(input.role.unwrap_or(UserRole::Staff))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Number of user accounts that have not been deleted
    pub async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// List users
    pub async fn list(&self, filter: UserFilter) -> AppResult<PaginatedResponse<User>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let users = query.build_query_as::<User>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(users, &pagination, total))
    }

    /// Get a user by ID
    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Find an active user by e-mail
    pub async fn find_active_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1) AND active = TRUE AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Update a user.
    ///
    /// Users may change their own name, e-mail and password; admins may change
    /// anyone's role and active flag. Any other requested change is refused as
    /// a whole.
    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: UpdateUserInput) -> AppResult<User> {
        input.validate()?;

        let requested = input.requested_fields();
        if requested.is_empty() {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }

        let forbidden = forbidden_user_fields(&requested, actor.user_id == id, actor.is_admin());
        if !forbidden.is_empty() {
            tracing::warn!(actor_id = %actor.user_id, target_id = %id, ?forbidden, "User update refused");
            return Err(AppError::Forbidden {
                message: format!("You are not allowed to update: {}", forbidden.join(", ")),
                message_es: format!("No tiene permiso para modificar: {}", forbidden.join(", ")),
            });
        }

        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE(LOWER($2), email),
                password_hash = COALESCE($3, password_hash),
                name = COALESCE($4, name),
                role = COALESCE($5, role),
                active = COALESCE($6, active)
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(input.email.as_deref().map(str::trim))
        .bind(password_hash)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.role)
        .bind(input.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        tracing::info!(user_id = %user.id, fields = ?requested, "User updated");
        Ok(user)
    }

    /// Soft-delete a user
    pub async fn remove(&self, actor: &AuthUser, id: Uuid) -> AppResult<()> {
        if actor.user_id == id {
            return Err(AppError::Conflict {
                resource: "user".to_string(),
                message: "You cannot delete your own account".to_string(),
                message_es: "No puede eliminar su propia cuenta".to_string(),
            });
        }

        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), active = FALSE WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}
