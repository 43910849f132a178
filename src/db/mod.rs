//! Storage layer: the user directory and the refresh-token store, behind
//! capability traits with PostgreSQL and in-memory implementations.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::{MemoryTokenStore, MemoryUserDirectory};
pub use models::{AccessToken, NewUser, RefreshToken, RegisterUser, User};
pub use operations::DbOperations;
pub use store::{RefreshTokenStore, UserDirectory};
