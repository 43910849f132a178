//! Authentication and session lifecycle.
//!
//! Passwords are hashed with argon2id, access tokens are HS256 JWTs and
//! refresh tokens are opaque UUIDs bound to a client fingerprint.

pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token_service;

pub use jwt::{Claims, JwtSigner, TokenSigner};
pub use middleware::AuthenticatedUser;
pub use password::{Argon2Hasher, PasswordHasher};
pub use service::{SessionPolicy, TokenPair, UserService};
pub use token_service::TokenService;
