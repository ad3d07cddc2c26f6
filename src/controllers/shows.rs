use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{ApiPath, AuthUser, StaffUser, ValidJson};
use crate::models::ShowInput;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/astronomy-shows", get(list_shows).post(create_show))
        .route(
            "/astronomy-shows/{id}",
            get(get_show).put(update_show).delete(delete_show),
        )
}

#[derive(Debug, Deserialize)]
pub struct ShowsQuery {
    pub show_theme: Option<String>,
}

/// Parses `"1, 2,3"` into theme ids. Empty segments are skipped.
pub fn parse_theme_ids(raw: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("invalid show_theme id: {s:?}")))
        })
        .collect()
}

async fn list_shows(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(params): Query<ShowsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let theme_ids = match params.show_theme.as_deref() {
        Some(raw) => parse_theme_ids(raw)?,
        None => Vec::new(),
    };
    Ok(Json(state.store.list_shows(&theme_ids).await?))
}

async fn get_show(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let show = state
        .store
        .get_show(id)
        .await?
        .ok_or_else(|| AppError::not_found("astronomy show", id))?;
    Ok(Json(show))
}

async fn create_show(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ValidJson(input): ValidJson<ShowInput>,
) -> Result<impl IntoResponse, AppError> {
    let show = state.store.create_show(&input).await?;
    Ok((StatusCode::CREATED, Json(show)))
}

async fn update_show(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
    ValidJson(input): ValidJson<ShowInput>,
) -> Result<impl IntoResponse, AppError> {
    let show = state
        .store
        .update_show(id, &input)
        .await?
        .ok_or_else(|| AppError::not_found("astronomy show", id))?;
    Ok(Json(show))
}

async fn delete_show(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_show(id).await? {
        return Err(AppError::not_found("astronomy show", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
