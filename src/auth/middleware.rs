use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use futures::future::{FutureExt, LocalBoxFuture};

use crate::context::RequestContext;
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::{AppState, Result};

/// Extractor for routes that require a valid access token. Carries the
/// account the token was issued to, loaded once per request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn is_store(&self) -> bool {
        self.user.is_store
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
}

async fn authenticate(
    state: Option<web::Data<AppState>>,
    token: Option<String>,
) -> Result<AuthenticatedUser> {
    let token = token.ok_or(AuthError::Unauthorized)?;
    let state =
        state.ok_or_else(|| AppError::InternalError("application state not configured".into()))?;

    let ctx = RequestContext::with_timeout(state.config.auth.request_timeout());
    let access = state.token_service.validate_token(&ctx, &token)?;

    // a token can outlive its account
    let user = match state.user_service.get_user_by_id(&ctx, access.user_id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => return Err(AuthError::InvalidToken.into()),
        Err(e) => return Err(e),
    };

    Ok(AuthenticatedUser {
        user,
        expires_at: access.expires_at,
    })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        authenticate(state, bearer_token(req)).boxed_local()
    }
}
