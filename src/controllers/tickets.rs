use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{ApiPath, AuthUser, JsonBody};
use crate::models::TicketRequest;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(list_tickets).post(book_ticket))
        .route("/tickets/{id}", get(get_ticket).delete(cancel_ticket))
}

async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_tickets(user.scope()).await?))
}

async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state
        .store
        .get_ticket(id, user.scope())
        .await?
        .ok_or_else(|| AppError::not_found("ticket", id))?;
    Ok(Json(ticket))
}

// POST /api/tickets
async fn book_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(request): JsonBody<TicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.reservations.book_seat(&request, &user).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

// DELETE /api/tickets/{id}
async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.reservations.cancel_ticket(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
