use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, SignupRequest},
        extractors::{cleared_session_cookie, session_cookie, Principal},
        jwt::JwtKeys,
        services::{authenticate, create_account, SIGNUP_MIN_NAME_LEN},
    },
    error::{AppError, AppResult},
    extract::AppJson,
    models::Role,
    state::AppState,
    store::UserRepo,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = create_account(
        state.store.as_ref(),
        &payload.name,
        &payload.email,
        &payload.password,
        Role::User,
        SIGNUP_MIN_NAME_LEN,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let keys = JwtKeys::from_ref(&state);
    let (user, session) =
        authenticate(state.store.as_ref(), &keys, &payload.email, &payload.password).await?;

    let cookie = session_cookie(
        &session.token,
        keys.ttl.as_secs() as i64,
        state.config.cookie_secure,
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user: user.into(),
        }),
    ))
}

/// Clears the cookie. Tokens are stateless and stay valid until expiry.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cleared_session_cookie(state.config.cookie_secure))],
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<PublicUser>> {
    let user = state
        .store
        .find_user(principal.user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %principal.user_id, "session for a deleted user");
            AppError::Unauthenticated
        })?;
    Ok(Json(user.into()))
}
