use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{ApiPath, AuthUser, StaffUser, ValidJson};
use crate::models::DomeInput;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/planetarium-domes", get(list_domes).post(create_dome))
        .route(
            "/planetarium-domes/{id}",
            get(get_dome).put(update_dome).delete(delete_dome),
        )
}

async fn list_domes(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_domes().await?))
}

async fn get_dome(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let dome = state
        .store
        .get_dome(id)
        .await?
        .ok_or_else(|| AppError::not_found("planetarium dome", id))?;
    Ok(Json(dome))
}

async fn create_dome(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ValidJson(input): ValidJson<DomeInput>,
) -> Result<impl IntoResponse, AppError> {
    let dome = state.store.create_dome(&input).await?;
    tracing::info!("created dome {} with {} seats", dome.id, dome.capacity());
    Ok((StatusCode::CREATED, Json(dome)))
}

// Shrinking a dome leaves already issued tickets untouched
async fn update_dome(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
    ValidJson(input): ValidJson<DomeInput>,
) -> Result<impl IntoResponse, AppError> {
    let dome = state
        .store
        .update_dome(id, &input)
        .await?
        .ok_or_else(|| AppError::not_found("planetarium dome", id))?;
    Ok(Json(dome))
}

async fn delete_dome(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_dome(id).await? {
        return Err(AppError::not_found("planetarium dome", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
