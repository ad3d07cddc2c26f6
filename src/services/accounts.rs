//! User registration and password checks.
//!
//! bcrypt is CPU-bound, so hashing and verification run on the blocking pool.

use tokio::sync::OnceCell;
use tracing::info;

use crate::models::User;
use crate::store::{PlanetariumStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("a user with email {0} already exists")]
    EmailTaken(String),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AccountError> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

pub async fn verify_password(user: &User, password: &str) -> Result<bool, AccountError> {
    let user = user.clone();
    let password = password.to_string();
    let ok = tokio::task::spawn_blocking(move || user.verify_password(&password)).await?;
    Ok(ok)
}

async fn verify_hash(password: &str, hash: &str) -> Result<bool, AccountError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false)).await?;
    Ok(ok)
}

/// Stand-in hash checked when a login names an unknown email, so that path
/// costs one bcrypt verification like a real password check.
#[derive(Debug, Clone, Default)]
pub struct DecoyHash(OnceCell<String>);

impl DecoyHash {
    async fn get(&self, cost: u32) -> Result<&str, AccountError> {
        let hash = self
            .0
            .get_or_try_init(|| hash_password("planetarium-decoy-password", cost))
            .await?;
        Ok(hash.as_str())
    }
}

/// Looks up `email` and checks `password`; `None` for either failure.
pub async fn authenticate(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
    cost: u32,
    decoy: &DecoyHash,
) -> Result<Option<User>, AccountError> {
    match store.find_user_by_email(email).await? {
        Some(user) => Ok(verify_password(&user, password).await?.then_some(user)),
        None => {
            verify_hash(password, decoy.get(cost).await?).await?;
            Ok(None)
        }
    }
}

pub async fn register(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
    is_staff: bool,
    cost: u32,
) -> Result<User, AccountError> {
    let hash = hash_password(password, cost).await?;
    match store.create_user(email, &hash, is_staff).await {
        Ok(user) => {
            info!("registered user {} (staff: {})", user.id, user.is_staff);
            Ok(user)
        }
        Err(StoreError::UniqueViolation(_)) => Err(AccountError::EmailTaken(email.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Creates the configured administrator unless the email is already registered.
pub async fn ensure_admin(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
    cost: u32,
) -> Result<(), AccountError> {
    if store.find_user_by_email(email).await?.is_some() {
        info!("admin account {} already present", email);
        return Ok(());
    }
    match register(store, email, password, true, cost).await {
        Ok(_) | Err(AccountError::EmailTaken(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
