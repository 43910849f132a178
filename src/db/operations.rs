use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{NewUser, RefreshToken, User};
use crate::db::store::{RefreshTokenStore, UserDirectory};
use crate::error::{AppError, DatabaseError};
use crate::Result;

const TOKEN_COLUMNS: &str = "uuid, user_id, fingerprint, created_at, expires_at, revoked_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, phone_number, is_store";

/// PostgreSQL-backed user directory and refresh-token store.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RefreshTokenStore for DbOperations {
    async fn insert_token(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO refresh_tokens ({TOKEN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(token.uuid)
        .bind(token.user_id)
        .bind(&token.fingerprint)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::Duplicate(_) => {
                DatabaseError::Duplicate("token with this uuid already exists".into())
            }
            other => other,
        })?;

        Ok(())
    }

    async fn get_actives_by_user_id(&self, user_id: i64) -> Result<Vec<RefreshToken>> {
        let tokens = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > now() \
             ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(tokens)
    }

    async fn revoke_actives_by_user_id(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > now()",
        )
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn update(&self, token: &RefreshToken) -> Result<RefreshToken> {
        let revoked_at = token.revoked_at.ok_or_else(|| {
            AppError::InternalError("refresh token update must set revoked_at".into())
        })?;

        sqlx::query_as::<_, RefreshToken>(&format!(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE uuid = $1 AND revoked_at IS NULL \
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(token.uuid)
        .bind(revoked_at)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn cleanup_expired_by_user_id(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at <= now()",
        )
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserDirectory for DbOperations {
    async fn insert_user(&self, user: &NewUser) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, email, phone_number, password_hash, is_store) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.is_store)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::Duplicate(_) => {
                DatabaseError::Duplicate("user with this email already exists".into())
            }
            other => other,
        })?;

        Ok(id)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }
}
