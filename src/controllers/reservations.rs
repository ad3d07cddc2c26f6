use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{ApiPath, AuthUser};
use crate::AppState;

// Reservations are created and removed only through tickets
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", get(list_reservations))
        .route("/reservations/{id}", get(get_reservation))
}

async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_reservations(user.scope()).await?))
}

async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let reservation = state
        .store
        .get_reservation(id, user.scope())
        .await?
        .ok_or_else(|| AppError::not_found("reservation", id))?;
    Ok(Json(reservation))
}
