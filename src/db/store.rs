use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{NewUser, RefreshToken, User};
use crate::Result;

/// Persistence for refresh-token sessions.
///
/// Implementations own the rows; callers never cache them between calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Inserts a new record. A UUID collision is a `Duplicate` error.
    async fn insert_token(&self, token: &RefreshToken) -> Result<()>;

    /// Tokens of `user_id` that are neither revoked nor expired.
    async fn get_actives_by_user_id(&self, user_id: i64) -> Result<Vec<RefreshToken>>;

    /// Revokes every active token of `user_id`, returning how many were revoked.
    async fn revoke_actives_by_user_id(&self, user_id: i64) -> Result<u64>;

    /// Fails with `DatabaseError::NotFound` when no row has this UUID.
    async fn get_by_uuid(&self, uuid: Uuid) -> Result<RefreshToken>;

    /// Persists `token.revoked_at`. The write only lands on a row that is not
    /// revoked yet; otherwise it fails with `DatabaseError::NotFound`, so a
    /// token can be rotated at most once.
    async fn update(&self, token: &RefreshToken) -> Result<RefreshToken>;

    /// Stamps `revoked_at` on expired, never-revoked tokens of `user_id`.
    async fn cleanup_expired_by_user_id(&self, user_id: i64) -> Result<u64>;
}

/// Source of user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the new user's id. A taken email is a `Duplicate` error.
    async fn insert_user(&self, user: &NewUser) -> Result<i64>;

    async fn get_user_by_email(&self, email: &str) -> Result<User>;

    async fn get_user_by_id(&self, id: i64) -> Result<User>;
}
