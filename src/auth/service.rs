use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::PasswordHasher;
use crate::auth::token_service::TokenService;
use crate::context::RequestContext;
use crate::db::models::{NewUser, RefreshToken, RegisterUser, User};
use crate::db::store::UserDirectory;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::Result;

/// How logins treat sessions that are still active.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Once a user holds this many active refresh tokens, the next login
    /// revokes all of them before issuing its own. Zero turns this off.
    pub max_active_sessions: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self { max_active_sessions: 1 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, login, refresh-token rotation and logout.
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    tokens: Arc<TokenService>,
    hasher: Arc<dyn PasswordHasher>,
    policy: SessionPolicy,
}

impl UserService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        tokens: Arc<TokenService>,
        hasher: Arc<dyn PasswordHasher>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            directory,
            tokens,
            hasher,
            policy,
        }
    }

    pub fn token_service(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Registers a user and opens their first session. A failure after the
    /// directory insert leaves the user in place.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        mut user: RegisterUser,
        fingerprint: &str,
    ) -> Result<TokenPair> {
        let password = std::mem::take(&mut user.password);
        let password_hash = self.hash_password(ctx, password).await?;
        let new_user = NewUser::from_registration(user, password_hash);

        let user_id = ctx.run(self.directory.insert_user(&new_user)).await?;
        info!("Registered user {}", user_id);

        self.issue(ctx, fingerprint, user_id).await
    }

    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        fingerprint: &str,
    ) -> Result<TokenPair> {
        let user = match ctx.run(self.directory.get_user_by_email(email)).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(AuthError::UserNotFound.into()),
            Err(e) => return Err(e),
        };

        if !self.compare_password(ctx, password, &user.password_hash).await? {
            warn!("Incorrect password for user {}", user.id);
            return Err(AuthError::IncorrectPassword.into());
        }

        self.enforce_session_cap(ctx, user.id).await?;
        // Fail-closed: a cleanup error blocks the login.
        self.tokens.cleanup_expired_by_user_id(ctx, user.id).await?;

        let pair = self.issue(ctx, fingerprint, user.id).await?;
        info!("User {} logged in", user.id);
        Ok(pair)
    }

    /// Rotates a refresh token: the presented token is revoked before its
    /// replacement is minted, and only one caller can win that revocation.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
        fingerprint: &str,
    ) -> Result<TokenPair> {
        let record = self.find_refresh_token(ctx, refresh_token).await?;

        if record.is_expired() || record.is_revoked() {
            return Err(AuthError::InvalidToken.into());
        }
        if !record.fingerprint_matches(fingerprint) {
            warn!("Fingerprint mismatch on refresh of token {}", record.uuid);
            return Err(AuthError::InvalidFingerprint.into());
        }

        match self.tokens.update(ctx, &record.revoked()).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!("Refresh token {} was already rotated", record.uuid);
                return Err(AuthError::InvalidToken.into());
            }
            Err(e) => return Err(e),
        }

        let user = match ctx.run(self.directory.get_user_by_id(record.user_id)).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(AuthError::UserNotFound.into()),
            Err(e) => return Err(e),
        };

        let (access_token, next) = self.tokens.generate_tokens(ctx, fingerprint, user.id)?;
        self.tokens.cleanup_expired_by_user_id(ctx, user.id).await?;
        self.tokens.insert_token(ctx, &next).await?;

        info!("Rotated refresh token {} into {} for user {}", record.uuid, next.uuid, user.id);
        Ok(TokenPair {
            access_token,
            refresh_token: next.uuid.to_string(),
        })
    }

    /// Revokes one refresh token. Dead tokens are rejected rather than
    /// ignored.
    pub async fn logout(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
        fingerprint: &str,
    ) -> Result<()> {
        let record = self.find_refresh_token(ctx, refresh_token).await?;

        if !record.fingerprint_matches(fingerprint) {
            warn!("Fingerprint mismatch on logout of token {}", record.uuid);
            return Err(AuthError::InvalidFingerprint.into());
        }
        if record.is_expired() || record.is_revoked() {
            return Err(AuthError::InvalidToken.into());
        }

        match self.tokens.update(ctx, &record.revoked()).await {
            Ok(_) => {
                info!("User {} logged out of token {}", record.user_id, record.uuid);
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(AuthError::InvalidToken.into()),
            Err(AppError::DatabaseError(e)) => Err(DatabaseError::QueryError(format!(
                "failed to revoke refresh token: {}",
                e
            ))
            .into()),
            Err(e) => Err(e),
        }
    }

    pub async fn get_user_by_id(&self, ctx: &RequestContext, id: i64) -> Result<User> {
        ctx.run(self.directory.get_user_by_id(id)).await
    }

    async fn issue(&self, ctx: &RequestContext, fingerprint: &str, user_id: i64) -> Result<TokenPair> {
        let (access_token, refresh) = self.tokens.generate_tokens(ctx, fingerprint, user_id)?;
        self.tokens.insert_token(ctx, &refresh).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.uuid.to_string(),
        })
    }

    async fn find_refresh_token(&self, ctx: &RequestContext, raw: &str) -> Result<RefreshToken> {
        let uuid = Uuid::parse_str(raw).map_err(|_| AuthError::InvalidToken)?;
        match self.tokens.get_by_uuid(ctx, uuid).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => Err(AuthError::InvalidToken.into()),
            Err(e) => Err(e),
        }
    }

    async fn enforce_session_cap(&self, ctx: &RequestContext, user_id: i64) -> Result<()> {
        let cap = self.policy.max_active_sessions as usize;
        if cap == 0 {
            return Ok(());
        }

        let actives = self.tokens.get_actives_token_by_user_id(ctx, user_id).await?;
        if actives.len() >= cap {
            let revoked = self.tokens.revoke_actives_by_user_id(ctx, user_id).await?;
            info!("Evicted {} active sessions of user {}", revoked, user_id);
        }
        Ok(())
    }

    async fn hash_password(&self, ctx: &RequestContext, password: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        ctx.run(async move { tokio::task::spawn_blocking(move || hasher.hash(&password)).await? })
            .await
    }

    async fn compare_password(&self, ctx: &RequestContext, password: &str, hash: &str) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = hash.to_string();
        ctx.run(async move {
            tokio::task::spawn_blocking(move || hasher.compare(&password, &hash)).await?
        })
        .await
    }
}
