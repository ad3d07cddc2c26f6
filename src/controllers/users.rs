use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::ValidJson;
use crate::models::NewUser;
use crate::services::accounts;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(register))
}

// POST /api/users, open to anonymous callers; always creates a non-staff user
async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(input): ValidJson<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = accounts::register(
        state.store.as_ref(),
        &input.email,
        &input.password,
        false,
        state.config.auth.bcrypt_cost,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}
