use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::{error::AppError, models::Role, state::AppState, store::UserRepo};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Authenticated caller, resolved from the request on every call.
///
/// The token must verify and its subject must still exist. `role` is the
/// stored role, so demotions apply to tokens issued before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: OffsetDateTime,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A [`Principal`] whose role is `admin`.
#[derive(Debug, Clone, Copy)]
pub struct AdminPrincipal(pub Principal);

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn cleared_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn cookie_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts).or_else(|| cookie_token(parts)) else {
            debug!("request without session credential");
            return Err(AppError::Unauthenticated);
        };

        let state = AppState::from_ref(state);
        let claims = JwtKeys::from_ref(&state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired session token");
            AppError::Unauthenticated
        })?;
        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
            .map_err(|_| AppError::Unauthenticated)?;

        let user = state.store.find_user(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "session for a deleted user");
            AppError::Unauthenticated
        })?;
        if user.role != claims.role {
            debug!(user_id = %user.id, token_role = %claims.role, role = %user.role, "role changed since login");
        }

        Ok(Principal {
            user_id: user.id,
            role: user.role,
            expires_at,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            warn!(user_id = %principal.user_id, "non-admin on admin route");
            return Err(AppError::Forbidden);
        }
        Ok(AdminPrincipal(principal))
    }
}
