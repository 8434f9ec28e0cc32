use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateNoteRequest, DeleteNoteResponse, ListNotesParams, SearchParams, UpdateNoteRequest},
    query::NotePage,
    services,
};
use crate::{
    auth::Principal,
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    models::Note,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/notes", get(list_notes))
        .route("/notes/:id", get(get_note))
        .route("/search", get(search_notes))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/notes", post(create_note))
        .route("/notes/:id", put(update_note).delete(delete_note))
}

#[instrument(skip(state))]
pub async fn list_notes(
    State(state): State<AppState>,
    principal: Principal,
    AppQuery(p): AppQuery<ListNotesParams>,
) -> AppResult<Json<NotePage>> {
    let page = services::list_notes(
        state.store.as_ref(),
        &principal,
        p.page,
        p.search.as_deref(),
        p.subject.as_deref(),
    )
    .await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn search_notes(
    State(state): State<AppState>,
    principal: Principal,
    AppQuery(p): AppQuery<SearchParams>,
) -> AppResult<Json<Vec<Note>>> {
    let notes = services::search_all(state.store.as_ref(), &principal, &p.q).await?;
    Ok(Json(notes))
}

#[instrument(skip(state))]
pub async fn get_note(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Note>> {
    let note = services::get_note(state.store.as_ref(), &principal, id).await?;
    Ok(Json(note))
}

#[instrument(skip(state, body))]
pub async fn create_note(
    State(state): State<AppState>,
    principal: Principal,
    AppJson(body): AppJson<CreateNoteRequest>,
) -> AppResult<(StatusCode, Json<Note>)> {
    let note = services::create_note(
        state.store.as_ref(),
        &principal,
        &body.title,
        &body.subject,
        &body.content,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

#[instrument(skip(state, body))]
pub async fn update_note(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateNoteRequest>,
) -> AppResult<Json<Note>> {
    let note = services::update_note(
        state.store.as_ref(),
        &principal,
        id,
        &body.title,
        &body.content,
        body.subject.as_deref(),
    )
    .await?;
    Ok(Json(note))
}

#[instrument(skip(state))]
pub async fn delete_note(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<DeleteNoteResponse>> {
    let note = services::delete_note(state.store.as_ref(), &principal, id).await?;
    Ok(Json(DeleteNoteResponse {
        success: true,
        undo: CreateNoteRequest::from(&note),
        note,
    }))
}
