use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{ApiPath, AuthUser, JsonBody, StaffUser};
use crate::models::SessionInput;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/show-sessions", get(list_sessions).post(create_session))
        .route(
            "/show-sessions/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
}

// GET /api/show-sessions returns the flattened summary form
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_sessions().await?))
}

// GET /api/show-sessions/{id} nests the full show and dome
async fn get_session(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .store
        .get_session(id)
        .await?
        .ok_or_else(|| AppError::not_found("show session", id))?;
    Ok(Json(session))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    JsonBody(input): JsonBody<SessionInput>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.store.create_session(&input).await?;
    tracing::info!(
        "scheduled session {} of show {} in dome {}",
        session.id, input.astronomy_show_id, input.planetarium_dome_id
    );
    Ok((StatusCode::CREATED, Json(session)))
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
    JsonBody(input): JsonBody<SessionInput>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .store
        .update_session(id, &input)
        .await?
        .ok_or_else(|| AppError::not_found("show session", id))?;
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_session(id).await? {
        return Err(AppError::not_found("show session", id));
    }
    tracing::info!("user {} deleted session {} and its tickets", staff.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}
