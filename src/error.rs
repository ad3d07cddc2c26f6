//! HTTP-facing error type.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl maps
//! each failure to a status code and a `{"error": "..."}` body. Internal
//! failures are logged here and reach the client only as a generic message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::accounts::AccountError;
use crate::services::reservations::BookingError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication credentials were not provided or are invalid")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("internal error: {0}")]
    Store(StoreError),
}

impl AppError {
    pub fn not_found(resource: &str, id: i64) -> Self {
        AppError::NotFound(format!("{resource} {id}"))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Booking(err) => match err {
                BookingError::NegativeCoordinate { .. }
                | BookingError::OutOfRange { .. }
                | BookingError::SeatTaken { .. }
                | BookingError::UnknownSession(_)
                | BookingError::UnknownReservation(_) => StatusCode::BAD_REQUEST,
                BookingError::NotFound(_) => StatusCode::NOT_FOUND,
                BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
                BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Account(err) => match err {
                AccountError::EmailTaken(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Constraint failures on catalog writes are the client's fault
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ForeignKeyViolation(_) => {
                AppError::BadRequest("a referenced object does not exist".to_string())
            }
            StoreError::UniqueViolation(_) => AppError::BadRequest("object already exists".to_string()),
            other => AppError::Store(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"planetarium\""),
            );
        }
        response
    }
}
