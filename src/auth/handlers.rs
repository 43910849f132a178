use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::service::TokenPair;
use crate::config::Settings;
use crate::context::RequestContext;
use crate::db::models::RegisterUser;
use crate::error::AppError;
use crate::{AppState, Result};

pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub user: RegisterUser,
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub fingerprint: String,
}

/// Body of refresh and logout. The refresh token falls back to the cookie.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub refresh_token: String,
    pub fingerprint: String,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

/// HTTP-only cookie scoped to the auth routes.
pub fn refresh_cookie(config: &Settings, token: &str) -> Cookie<'static> {
    let mut builder = Cookie::build(REFRESH_COOKIE, token.to_string())
        .path(format!("{}/auth", config.cookie.base_path))
        .http_only(true)
        .secure(config.cookie.secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(
            config.auth.refresh_token_ttl().num_seconds(),
        ));
    if !config.cookie.domain.is_empty() {
        builder = builder.domain(config.cookie.domain.clone());
    }
    builder.finish()
}

fn request_context(state: &AppState) -> RequestContext {
    RequestContext::with_timeout(state.config.auth.request_timeout())
}

fn presented_refresh_token(req: &HttpRequest, body: &SessionRequest) -> Result<String> {
    if !body.refresh_token.is_empty() {
        return Ok(body.refresh_token.clone());
    }
    req.cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::ValidationError("refresh_token is required".into()))
}

fn issued(state: &AppState, mut response: actix_web::HttpResponseBuilder, pair: TokenPair) -> HttpResponse {
    response
        .cookie(refresh_cookie(&state.config, &pair.refresh_token))
        .json(pair)
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let RegisterRequest { user, fingerprint } = req.into_inner();
    require("email", &user.email)?;
    require("password", &user.password)?;
    require("fingerprint", &fingerprint)?;
    info!("Received registration request for email: {}", user.email);

    let email = user.email.clone();
    let ctx = request_context(&state);
    match state.user_service.create_user(&ctx, user, &fingerprint).await {
        Ok(pair) => {
            info!("Registration successful for email: {}", email);
            Ok(issued(&state, HttpResponse::Ok(), pair))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require("email", &req.email)?;
    require("password", &req.password)?;
    require("fingerprint", &req.fingerprint)?;
    info!("Received login request for email: {}", req.email);

    let ctx = request_context(&state);
    match state
        .user_service
        .authenticate(&ctx, &req.email, &req.password, &req.fingerprint)
        .await
    {
        Ok(pair) => {
            info!("Login successful for email: {}", req.email);
            Ok(issued(&state, HttpResponse::Ok(), pair))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn refresh(
    http: HttpRequest,
    req: web::Json<SessionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require("fingerprint", &req.fingerprint)?;
    let token = presented_refresh_token(&http, &req)?;

    let ctx = request_context(&state);
    let pair = state
        .user_service
        .refresh(&ctx, &token, &req.fingerprint)
        .await?;
    Ok(issued(&state, HttpResponse::Ok(), pair))
}

pub async fn logout(
    http: HttpRequest,
    req: web::Json<SessionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require("fingerprint", &req.fingerprint)?;
    let token = presented_refresh_token(&http, &req)?;

    let ctx = request_context(&state);
    state
        .user_service
        .logout(&ctx, &token, &req.fingerprint)
        .await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn me(auth: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(&auth.user)
}
