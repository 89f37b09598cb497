//! Authentication service for login and token management

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::Role;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Credentials row
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    username: String,
    role: String,
    password_hash: String,
    is_active: bool,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Authenticate user with username and password
    pub async fn login(&self, username: &str, password: &str) -> AppResult<AuthTokens> {
        let user = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, username, role, password_hash, is_active
            FROM users
            WHERE username = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        // Verify password before revealing account state
        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let role = parse_role(&user.role)?;
        let tokens = self.generate_tokens(user.id, &user.username, role)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        tracing::info!(user_id = %user.id, %role, "user logged in");

        Ok(tokens)
    }

    /// Rotate a refresh token into a fresh token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = Self::hash_token(refresh_token);

        let mut tx = self.db.begin().await?;

        // Revoke in the same statement that validates, so a token cannot be used twice
        let user = sqlx::query_as::<_, (Uuid, String, String)>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM users u
            WHERE rt.token_hash = $1
              AND rt.user_id = u.id
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND u.is_active = true
              AND u.deleted_at IS NULL
            RETURNING u.id, u.username, u.role
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let (user_id, username, role) = user;
        let role = parse_role(&role)?;
        let tokens = self.generate_tokens(user_id, &username, role)?;

        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(Self::hash_token(&tokens.refresh_token))
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(tokens)
    }

    /// Revoke a refresh token. Unknown tokens are ignored.
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(Self::hash_token(refresh_token))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Revoke every refresh token of a user (deactivation, password reset)
    pub async fn revoke_all(db: &PgPool, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Create the first admin account when no users exist.
    ///
    /// Returns `true` when an account was created.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> AppResult<bool> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        if existing > 0 {
            return Ok(false);
        }

        shared::validate_username(username).map_err(|m| AppError::validation("username", m))?;
        shared::validate_password(password).map_err(|m| AppError::validation("password", m))?;

        let password_hash = Self::hash_password(password)?;

        sqlx::query(
            r#"
            INSERT INTO users (username, name, role, password_hash)
            VALUES ($1, $2, 'admin', $3)
            "#,
        )
        .bind(username)
        .bind("Administrator")
        .bind(&password_hash)
        .execute(&self.db)
        .await?;

        Ok(true)
    }

    /// Decode a token and turn its claims into the request identity
    pub fn authenticate_token(token: &str, secret: &str) -> AppResult<AuthUser> {
        let claims = Self::decode_token(token, secret)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            username: claims.username,
            role: claims.role,
        })
    }

    /// Validate access token and return claims
    pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            AppError::InvalidToken
        })
    }

    pub fn hash_password(password: &str) -> AppResult<String> {
        hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user_id: Uuid, username: &str, role: Role) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let access_claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        // Refresh token is opaque; only its hash is stored
        let refresh_token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(Self::hash_token(token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// SHA-256 of a token for storage
    pub fn hash_token(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

fn parse_role(role: &str) -> AppResult<Role> {
    role.parse()
        .map_err(|e| AppError::Internal(format!("Corrupt user record: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_claims(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_hash_token_is_stable_and_distinct() {
        assert_eq!(AuthService::hash_token("abc"), AuthService::hash_token("abc"));
        assert_ne!(AuthService::hash_token("abc"), AuthService::hash_token("abd"));
        // 32 bytes, base64 without padding
        assert_eq!(AuthService::hash_token("abc").len(), 43);
    }

    #[test]
    fn test_authenticate_token_round_trip() {
        let user_id = Uuid::new_v4();
        let now = Utc::now().timestamp();
        let token = encode_claims(
            &Claims {
                sub: user_id.to_string(),
                username: "kitchen1".to_string(),
                role: Role::Kitchen,
                exp: now + 600,
                iat: now,
            },
            "secret",
        );

        let user = AuthService::authenticate_token(&token, "secret").unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, Role::Kitchen);

        assert!(matches!(
            AuthService::authenticate_token(&token, "other-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let token = encode_claims(
            &Claims {
                sub: Uuid::new_v4().to_string(),
                username: "cashier".to_string(),
                role: Role::Cashier,
                exp: now - 3600,
                iat: now - 7200,
            },
            "secret",
        );

        assert!(AuthService::decode_token(&token, "secret").is_err());
    }
}
