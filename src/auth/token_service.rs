use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::TokenSigner;
use crate::context::RequestContext;
use crate::db::models::{AccessToken, RefreshToken};
use crate::db::store::RefreshTokenStore;
use crate::error::AuthError;
use crate::Result;

/// Issues access tokens and manages refresh-token records.
///
/// Refresh records are built here but persisted only when the caller asks
/// via [`TokenService::insert_token`], so the caller decides how issuing a
/// token is ordered against its other writes.
pub struct TokenService {
    store: Arc<dyn RefreshTokenStore>,
    signer: Arc<dyn TokenSigner>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        store: Arc<dyn RefreshTokenStore>,
        signer: Arc<dyn TokenSigner>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            signer,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs an access token and builds an unsaved refresh record.
    pub fn generate_tokens(
        &self,
        ctx: &RequestContext,
        fingerprint: &str,
        user_id: i64,
    ) -> Result<(String, RefreshToken)> {
        ctx.check()?;
        let access_token = self.signer.generate(user_id, self.access_ttl)?;

        ctx.check()?;
        let refresh = RefreshToken::new(user_id, fingerprint.to_string(), self.refresh_ttl);

        Ok((access_token, refresh))
    }

    /// Expired and malformed tokens fail identically with `InvalidToken`.
    pub fn validate_token(&self, ctx: &RequestContext, token: &str) -> Result<AccessToken> {
        ctx.check()?;
        let access = self.signer.parse(token)?;
        if access.is_expired_at(Utc::now()) {
            return Err(AuthError::InvalidToken.into());
        }
        Ok(access)
    }

    pub async fn insert_token(&self, ctx: &RequestContext, token: &RefreshToken) -> Result<()> {
        ctx.run(self.store.insert_token(token)).await
    }

    pub async fn get_actives_token_by_user_id(
        &self,
        ctx: &RequestContext,
        user_id: i64,
    ) -> Result<Vec<RefreshToken>> {
        ctx.run(self.store.get_actives_by_user_id(user_id)).await
    }

    pub async fn revoke_actives_by_user_id(&self, ctx: &RequestContext, user_id: i64) -> Result<u64> {
        ctx.run(self.store.revoke_actives_by_user_id(user_id)).await
    }

    pub async fn get_by_uuid(&self, ctx: &RequestContext, uuid: Uuid) -> Result<RefreshToken> {
        ctx.run(self.store.get_by_uuid(uuid)).await
    }

    pub async fn update(&self, ctx: &RequestContext, token: &RefreshToken) -> Result<RefreshToken> {
        ctx.run(self.store.update(token)).await
    }

    pub async fn cleanup_expired_by_user_id(&self, ctx: &RequestContext, user_id: i64) -> Result<u64> {
        ctx.run(self.store.cleanup_expired_by_user_id(user_id)).await
    }
}
