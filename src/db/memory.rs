use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{NewUser, RefreshToken, User};
use crate::db::store::{RefreshTokenStore, UserDirectory};
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Refresh-token store kept in process memory. Every mutation happens under
/// one write lock, which gives the same at-most-once rotation as the
/// conditional UPDATE in Postgres.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<Uuid, RefreshToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of `user_id`, revoked and expired included.
    pub async fn tokens_for(&self, user_id: i64) -> Vec<RefreshToken> {
        let tokens = self.tokens.read().await;
        let mut owned: Vec<_> = tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|t| t.created_at);
        owned
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryTokenStore {
    async fn insert_token(&self, token: &RefreshToken) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.uuid) {
            return Err(DatabaseError::Duplicate("token with this uuid already exists".into()).into());
        }
        tokens.insert(token.uuid, token.clone());
        Ok(())
    }

    async fn get_actives_by_user_id(&self, user_id: i64) -> Result<Vec<RefreshToken>> {
        let tokens = self.tokens.read().await;
        let mut actives: Vec<_> = tokens
            .values()
            .filter(|t| t.user_id == user_id && t.is_active())
            .cloned()
            .collect();
        actives.sort_by_key(|t| t.created_at);
        Ok(actives)
    }

    async fn revoke_actives_by_user_id(&self, user_id: i64) -> Result<u64> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let mut revoked = 0;
        for token in tokens.values_mut() {
            if token.user_id == user_id && token.is_active() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<RefreshToken> {
        self.tokens
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn update(&self, token: &RefreshToken) -> Result<RefreshToken> {
        let revoked_at = token.revoked_at.ok_or_else(|| {
            AppError::InternalError("refresh token update must set revoked_at".into())
        })?;

        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&token.uuid) {
            Some(stored) if stored.revoked_at.is_none() => {
                stored.revoked_at = Some(revoked_at);
                Ok(stored.clone())
            }
            _ => Err(DatabaseError::NotFound.into()),
        }
    }

    async fn cleanup_expired_by_user_id(&self, user_id: i64) -> Result<u64> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let mut cleaned = 0;
        for token in tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() && token.expires_at <= now {
                token.revoked_at = Some(now);
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }
}

#[derive(Debug, Default)]
struct Users {
    next_id: i64,
    by_id: HashMap<i64, User>,
}

/// User directory kept in process memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<Users>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn insert_user(&self, user: &NewUser) -> Result<i64> {
        let mut users = self.users.write().await;
        if users.by_id.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Duplicate("user with this email already exists".into()).into());
        }
        users.next_id += 1;
        let id = users.next_id;
        users.by_id.insert(
            id,
            User {
                id,
                name: user.name.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                phone: user.phone.clone(),
                is_store: user.is_store,
            },
        );
        Ok(id)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.users
            .read()
            .await
            .by_id
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.users
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }
}
