use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Marketplace account as stored in the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(rename = "phone_number")]
    pub phone: String,
    pub is_store: bool,
}

/// Registration input. `password` is plaintext and never leaves the user
/// service unhashed.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_store: bool,
}

/// Row handed to the directory on registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub is_store: bool,
}

impl NewUser {
    pub fn from_registration(user: RegisterUser, password_hash: String) -> Self {
        Self {
            name: user.name,
            email: user.email,
            password_hash,
            phone: user.phone,
            is_store: user.is_store,
        }
    }
}

/// Claims recovered from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Persisted refresh-token session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub uuid: Uuid,
    pub user_id: i64,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn new(user_id: i64, fingerprint: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            user_id,
            fingerprint,
            created_at: now,
            expires_at: now + ttl,
            revoked_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }

    pub fn fingerprint_matches(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }

    /// Copy of this record stamped as revoked now.
    pub fn revoked(&self) -> Self {
        Self {
            revoked_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_refresh_token_is_active() {
        let token = RefreshToken::new(1, "fp".into(), Duration::hours(1));
        assert!(token.is_active());
        assert_eq!(token.expires_at - token.created_at, Duration::hours(1));
        assert!(token.fingerprint_matches("fp"));
        assert!(!token.fingerprint_matches("other"));
    }

    #[test]
    fn test_revoked_and_expired_tokens_are_inactive() {
        let token = RefreshToken::new(1, "fp".into(), Duration::hours(1));
        let revoked = token.revoked();
        assert_eq!(revoked.uuid, token.uuid);
        assert!(revoked.is_revoked());
        assert!(!revoked.is_active());

        let expired = RefreshToken::new(1, "fp".into(), Duration::seconds(-1));
        assert!(expired.is_expired());
        assert!(!expired.is_active());
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let user = User {
            id: 3,
            name: "Ann".into(),
            email: "ann@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            phone: String::new(),
            is_store: true,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["is_store"], true);
    }
}
