use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use validator::Validate;

use crate::error::AppError;
use crate::services::accounts;
use crate::store::Owner;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

impl AuthUser {
    /// Reservation/ticket visibility: staff see everything, everyone else only their own.
    pub fn scope(&self) -> Owner {
        if self.is_staff {
            None
        } else {
            Some(self.user_id)
        }
    }
}

/// Splits a `Basic` authorization header into `(email, password)`.
pub fn parse_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (email, password) = credentials.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

// Basic Auth extractor
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .ok_or(AppError::Unauthorized)?;

        let user = accounts::authenticate(
            state.store.as_ref(),
            &email,
            &password,
            state.config.auth.bcrypt_cost,
            &state.decoy_hash,
        )
        .await?
        .ok_or_else(|| {
            tracing::debug!("rejected credentials for {}", email);
            AppError::Unauthorized
        })?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            is_staff: user.is_staff,
        })
    }
}

/// An authenticated user with the staff flag set.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Forbidden(
                "you do not have permission to perform this action".to_string(),
            ));
        }
        Ok(StaffUser(user))
    }
}

/// Path parameters whose rejection renders as an [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// JSON body whose rejection renders as an [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// JSON body that is also run through its `validator` rules.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(credentials: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }

    #[test]
    fn parses_basic_credentials() {
        let parsed = parse_basic(&basic("ann@example.com:pa:ss"));
        assert_eq!(
            parsed,
            Some(("ann@example.com".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(parse_basic("Bearer abc"), None);
        assert_eq!(parse_basic("Basic !!!not-base64"), None);
        assert_eq!(parse_basic(&basic("no-colon")), None);
    }

    #[test]
    fn staff_scope_is_unrestricted() {
        let mut user = AuthUser {
            user_id: 7,
            email: "ann@example.com".to_string(),
            is_staff: false,
        };
        assert_eq!(user.scope(), Some(7));
        user.is_staff = true;
        assert_eq!(user.scope(), None);
    }
}
