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
use crate::models::ThemeInput;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/show-themes", get(list_themes).post(create_theme))
        .route(
            "/show-themes/{id}",
            get(get_theme).put(update_theme).delete(delete_theme),
        )
}

async fn list_themes(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_themes().await?))
}

async fn get_theme(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let theme = state
        .store
        .get_theme(id)
        .await?
        .ok_or_else(|| AppError::not_found("show theme", id))?;
    Ok(Json(theme))
}

async fn create_theme(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ValidJson(input): ValidJson<ThemeInput>,
) -> Result<impl IntoResponse, AppError> {
    let theme = state.store.create_theme(&input).await?;
    Ok((StatusCode::CREATED, Json(theme)))
}

async fn update_theme(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
    ValidJson(input): ValidJson<ThemeInput>,
) -> Result<impl IntoResponse, AppError> {
    let theme = state
        .store
        .update_theme(id, &input)
        .await?
        .ok_or_else(|| AppError::not_found("show theme", id))?;
    Ok(Json(theme))
}

async fn delete_theme(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_theme(id).await? {
        return Err(AppError::not_found("show theme", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
