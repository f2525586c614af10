//! REST API over a [`NoteStore`].
//!
//! `/api/notes` exposes list/get/create/update/delete. Store calls block on
//! file I/O, so each one runs on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cornell_core::{NoteFields, NoteRecord, NoteStore, StoreError};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn NoteStore>,
}

/// Error body, `{"message": "..."}`
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Note not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound
        } else {
            ApiError::Store(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Task(_) => {
                tracing::error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the API router around `store`
pub fn router(store: Arc<dyn NoteStore>) -> Router {
    Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/:id",
            get(get_note).put(update_note).delete(delete_note),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

/// Run a store call on the blocking pool
async fn with_store<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn NoteStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || call(store.as_ref())).await?;
    Ok(result?)
}

async fn list_notes(State(state): State<AppState>) -> Result<Json<Vec<NoteRecord>>, ApiError> {
    let notes = with_store(&state, |store| store.list()).await?;
    Ok(Json(notes))
}

async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NoteRecord>, ApiError> {
    let note = with_store(&state, move |store| store.get(&id)).await?;
    Ok(Json(note))
}

async fn create_note(
    State(state): State<AppState>,
    Json(fields): Json<NoteFields>,
) -> Result<(StatusCode, Json<NoteRecord>), ApiError> {
    let note = with_store(&state, move |store| store.create(fields)).await?;
    tracing::info!(id = %note.id, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<NoteFields>,
) -> Result<Json<NoteRecord>, ApiError> {
    let note = with_store(&state, move |store| store.update(&id, fields)).await?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
