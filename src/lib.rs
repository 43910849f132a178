pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

use auth::{handlers, Argon2Hasher, JwtSigner, SessionPolicy, TokenService, UserService};
use db::{DbOperations, MemoryTokenStore, MemoryUserDirectory, RefreshTokenStore, UserDirectory};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Mounts every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(handlers::register))
                .route("/login", web::post().to(handlers::login))
                .route("/refresh", web::post().to(handlers::refresh))
                .route("/logout", web::post().to(handlers::logout)),
        )
        .route("/users/me", web::get().to(handlers::me));
}

/// Undecodable bodies answer with the JSON error shape instead of actix's
/// plain-text 400. The serde detail stays in the logs.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        warn!("Rejected request body for {}: {}", req.path(), err);
        AppError::ValidationError("invalid request body".into()).into()
    })
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub token_service: Arc<TokenService>,
    pub user_service: Arc<UserService>,
    db: Option<DbOperations>,
}

impl AppState {
    /// Connects to PostgreSQL and applies pending migrations when enabled.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;

        if config.database.run_migrations {
            db.run_migrations().await?;
        }

        let shared = Arc::new(db.clone());
        Self::assemble(config, shared.clone(), shared, Some(db))
    }

    /// State backed by process-local stores. Nothing survives a restart.
    pub fn in_memory(config: Settings) -> Result<Self> {
        Self::assemble(
            config,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(MemoryUserDirectory::new()),
            None,
        )
    }

    fn assemble(
        config: Settings,
        store: Arc<dyn RefreshTokenStore>,
        directory: Arc<dyn UserDirectory>,
        db: Option<DbOperations>,
    ) -> Result<Self> {
        if config.auth.jwt_secret.is_empty() {
            return Err(AppError::ConfigError("auth.jwt_secret must not be empty".into()));
        }

        let hasher = Argon2Hasher::from_config(&config.auth.password)?;
        let signer = JwtSigner::new(config.auth.jwt_secret.as_bytes());
        let token_service = Arc::new(TokenService::new(
            store,
            Arc::new(signer),
            config.auth.access_token_ttl(),
            config.auth.refresh_token_ttl(),
        ));
        let user_service = Arc::new(UserService::new(
            directory,
            token_service.clone(),
            Arc::new(hasher),
            SessionPolicy {
                max_active_sessions: config.auth.max_active_sessions,
            },
        ));

        info!(
            "Session policy: max {} active sessions per user",
            config.auth.max_active_sessions
        );

        Ok(Self {
            config: Arc::new(config),
            token_service,
            user_service,
            db,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
        }
        Ok(())
    }
}
