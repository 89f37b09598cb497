//! Staff account management

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{Role, User};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;

/// User service for admin account management
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    name: String,
    email: Option<String>,
    role: String,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            name: row.name,
            email: row.email,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("{}", e)))?,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, username, name, email, role, is_active, last_login_at, created_at, updated_at";

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    pub username: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Role,
    pub password: String,
}

/// Input for updating a user
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_users(&self, include_inactive: bool) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE deleted_at IS NULL AND (is_active OR $1)
            ORDER BY name ASC
            "#
        ))
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?
        .try_into()
    }

    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;
        shared::validate_username(&input.username)
            .map_err(|m| AppError::validation("username", m))?;
        shared::validate_password(&input.password)
            .map_err(|m| AppError::validation("password", m))?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(&input.username)
        .fetch_one(&self.db)
        .await?;

        if existing > 0 {
            return Err(AppError::DuplicateEntry("username".to_string()));
        }

        let password_hash = AuthService::hash_password(&input.password)?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, name, email, role, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&input.username)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(input.role.as_str())
        .bind(&password_hash)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %row.id, role = %input.role, "user created");

        row.try_into()
    }

    pub async fn update_user(
        &self,
        acting_user: Uuid,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<User> {
        input.validate()?;

        if let Some(ref password) = input.password {
            shared::validate_password(password)
                .map_err(|m| AppError::validation("password", m))?;
        }
        let password_hash = match input.password {
            Some(ref password) => Some(AuthService::hash_password(password)?),
            None => None,
        };

        let mut tx = self.db.begin().await?;
        let active_admins = Self::lock_active_admins(&mut tx).await?;
        let existing: User = Self::lock_user(&mut tx, user_id).await?.try_into()?;

        let deactivating = input.is_active == Some(false) && existing.is_active;
        let demoting = existing.role == Role::Admin
            && input.role.map(|r| r != Role::Admin).unwrap_or(false);

        if user_id == acting_user && (deactivating || demoting) {
            return Err(AppError::BusinessRule(
                "You cannot deactivate or demote your own account".to_string(),
            ));
        }
        if deactivating || demoting {
            ensure_admin_remains(&active_admins, user_id)?;
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.email)
        .bind(input.role.map(|r| r.as_str()))
        .bind(input.is_active)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if deactivating || password_hash.is_some() {
            AuthService::revoke_all(&self.db, user_id).await?;
        }

        row.try_into()
    }

    /// Soft delete a user
    pub async fn delete_user(&self, acting_user: Uuid, user_id: Uuid) -> AppResult<()> {
        if user_id == acting_user {
            return Err(AppError::BusinessRule(
                "You cannot delete your own account".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let active_admins = Self::lock_active_admins(&mut tx).await?;
        Self::lock_user(&mut tx, user_id).await?;
        ensure_admin_remains(&active_admins, user_id)?;

        sqlx::query(
            "UPDATE users SET deleted_at = NOW(), is_active = false, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        AuthService::revoke_all(&self.db, user_id).await?;

        tracing::info!(%user_id, "user deleted");

        Ok(())
    }

    /// Row-lock every active admin so concurrent removals serialise on them
    async fn lock_active_admins(tx: &mut Transaction<'_, Postgres>) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users
            WHERE role = 'admin' AND is_active AND deleted_at IS NULL
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }

    async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> AppResult<UserRow> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
    }
}

/// The platform must always keep one active admin.
///
/// `active_admins` is the locked set of active admin ids; removing a user
/// who is not in it never breaks the rule.
pub fn ensure_admin_remains(active_admins: &[Uuid], removing: Uuid) -> AppResult<()> {
    if active_admins.contains(&removing) && active_admins.iter().all(|id| *id == removing) {
        return Err(AppError::BusinessRule(
            "At least one active admin account is required".to_string(),
        ));
    }
    Ok(())
}
