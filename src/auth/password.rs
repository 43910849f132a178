//! Password hashing with argon2id.

use argon2::password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

use crate::config::PasswordConfig;
use crate::error::AppError;
use crate::Result;

const DECOY_PASSWORD: &str = "decoy-password";

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes `password` under a fresh random salt embedded in the output.
    fn hash(&self, password: &str) -> Result<String>;

    /// `Ok(false)` on a wrong password; `Err` when `hash` cannot be used.
    fn compare(&self, password: &str, hash: &str) -> Result<bool>;
}

pub struct Argon2Hasher {
    params: Params,
    // verified against when a stored hash is malformed, so every compare
    // costs exactly one argon2 evaluation
    decoy: String,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::ConfigError(format!("invalid argon2 parameters: {}", e)))?;
        let decoy = hash_with(&params, DECOY_PASSWORD)?;
        Ok(Self { params, decoy })
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self> {
        Self::new(config.memory_kib, config.iterations, config.parallelism)
    }
}

fn argon2(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn salt() -> Result<SaltString> {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    SaltString::encode_b64(&bytes)
        .map_err(|e| AppError::InternalError(format!("failed to encode salt: {}", e)))
}

fn hash_with(params: &Params, password: &str) -> Result<String> {
    argon2(params)
        .hash_password(password.as_bytes(), &salt()?)
        .map(|h| h.to_string())
        .map_err(|e| AppError::InternalError(format!("failed to hash password: {}", e)))
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        hash_with(&self.params, password)
    }

    fn compare(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                if let Ok(decoy) = PasswordHash::new(&self.decoy) {
                    let _ = argon2(&self.params).verify_password(password.as_bytes(), &decoy);
                }
                return Err(AppError::InternalError(format!("malformed password hash: {}", e)));
            }
        };

        match argon2(&self.params).verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::InternalError(format!("failed to verify password: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_compare() {
        let hasher = hasher();
        let hash = hasher.hash("pw1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.compare("pw1", &hash).unwrap());
        assert!(!hasher.compare("pw2", &hash).unwrap());
        assert!(!hasher.compare("", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let hasher = hasher();
        let first = hasher.hash("secret").unwrap();
        let second = hasher.hash("secret").unwrap();
        assert_ne!(first, second);
        assert!(hasher.compare("secret", &first).unwrap());
        assert!(hasher.compare("secret", &second).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let hasher = hasher();
        let err = hasher.compare("pw1", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
    }

    #[test]
    fn test_decoy_ready_at_construction() {
        let hasher = hasher();
        assert!(hasher.decoy.starts_with("$argon2id$"));
        assert!(PasswordHash::new(&hasher.decoy).is_ok());
        assert!(hasher.compare(DECOY_PASSWORD, &hasher.decoy).unwrap());

        let before = hasher.decoy.clone();
        assert!(hasher.compare("pw1", "garbage").is_err());
        assert_eq!(hasher.decoy, before);
    }

    #[test]
    fn test_hash_made_with_other_params_still_verifies() {
        let strong = Argon2Hasher::new(2048, 2, 1).unwrap();
        let hash = strong.hash("pw").unwrap();
        assert!(hasher().compare("pw", &hash).unwrap());
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(Argon2Hasher::new(1, 0, 0), Err(AppError::ConfigError(_))));
    }
}
