use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    analytics::{self, Dashboard},
    dto::{AdminUserView, CreateUserRequest, SetRoleRequest, SuccessResponse},
    services,
};
use crate::{
    auth::{dto::PublicUser, AdminPrincipal},
    error::AppResult,
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/create", post(create_user))
        .route("/admin/users/:id", put(set_role).delete(delete_user))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/admin/stats", get(stats))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
) -> AppResult<Json<Vec<AdminUserView>>> {
    Ok(Json(services::list_users(state.store.as_ref()).await?))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    AppJson(body): AppJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = services::create_user(
        state.store.as_ref(),
        &body.name,
        &body.email,
        &body.password,
        body.role,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn set_role(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<SetRoleRequest>,
) -> AppResult<Json<PublicUser>> {
    let user = services::set_role(state.store.as_ref(), &admin, id, body.role).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::delete_user(state.store.as_ref(), &admin, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
) -> AppResult<Json<Dashboard>> {
    let dashboard = analytics::dashboard(state.store.as_ref(), OffsetDateTime::now_utc()).await?;
    Ok(Json(dashboard))
}
