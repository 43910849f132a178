use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

/// Machine-readable error category surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    DatabaseError,
    InternalError,
    DuplicateError,
    BadRequest,
    Unauthorized,
    InvalidToken,
    InvalidFingerprint,
    Conflict,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DatabaseError => "DATABASE_ERROR",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::DuplicateError => "DUPLICATE_ERROR",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::InvalidToken => "INVALID_TOKEN",
            ErrorKind::InvalidFingerprint => "INVALID_FINGERPRINT",
            ErrorKind::Conflict => "CONFLICT",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::UserNotFound => ErrorKind::NotFound,
                AuthError::IncorrectPassword => ErrorKind::Unauthorized,
                AuthError::Unauthorized => ErrorKind::Unauthorized,
                AuthError::InvalidToken => ErrorKind::InvalidToken,
                AuthError::InvalidFingerprint => ErrorKind::InvalidFingerprint,
            },
            AppError::DatabaseError(e) => match e {
                DatabaseError::NotFound => ErrorKind::NotFound,
                DatabaseError::Duplicate(_) => ErrorKind::DuplicateError,
                DatabaseError::ConnectionError(_) | DatabaseError::QueryError(_) => {
                    ErrorKind::DatabaseError
                }
            },
            AppError::ValidationError(_) => ErrorKind::BadRequest,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::ConfigError(_)
            | AppError::InternalError(_)
            | AppError::Cancelled
            | AppError::DeadlineExceeded => ErrorKind::InternalError,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Message safe to hand to a client. Causes wrapped in server-side
    /// faults stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::DatabaseError(DatabaseError::NotFound) => "not found".to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate(msg)) => msg.clone(),
            AppError::DatabaseError(_) => "database error".to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Cancelled => "request cancelled".to_string(),
            AppError::DeadlineExceeded => "request timed out".to_string(),
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                "internal server error".to_string()
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(DatabaseError::NotFound)
                | AppError::AuthError(AuthError::UserNotFound)
        )
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                DatabaseError::Duplicate(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::QueryError(err.to_string()))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("background task failed: {}", err))
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", self.code(), self);
        }
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "code": self.code(),
                "message": self.public_message()
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Cancelled | AppError::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            _ => match self.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                ErrorKind::DuplicateError | ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Unauthorized
                | ErrorKind::InvalidToken
                | ErrorKind::InvalidFingerprint => StatusCode::UNAUTHORIZED,
                ErrorKind::DatabaseError | ErrorKind::InternalError => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("invalid token")]
    InvalidToken,

    #[error("fingerprints don't match")]
    InvalidFingerprint,

    #[error("missing credentials")]
    Unauthorized,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record: {0}")]
    Duplicate(String),
}
