pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::{Config, StoreBackend};
use services::accounts::{self, AccountError, DecoyHash};
use services::reservations::SeatReservationManager;
use store::{MemoryStore, PgStore, PlanetariumStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("admin bootstrap failed: {0}")]
    Admin(#[from] AccountError),
}

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlanetariumStore>,
    pub reservations: SeatReservationManager,
    pub decoy_hash: DecoyHash,
    pub config: Config,
}

impl AppState {
    /// Connects the configured store, runs migrations and bootstraps the admin.
    pub async fn new(config: Config) -> Result<Arc<Self>, StartupError> {
        let store: Arc<dyn PlanetariumStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let db = database::Database::from_config(&config.database).await?;
                db.run_migrations().await?;
                Arc::new(PgStore::new(db))
            }
            StoreBackend::Memory => {
                info!("Using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        if let (Some(email), Some(password)) =
            (&config.auth.admin_email, &config.auth.admin_password)
        {
            accounts::ensure_admin(store.as_ref(), email, password, config.auth.bcrypt_cost)
                .await?;
        }

        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Arc<dyn PlanetariumStore>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            reservations: SeatReservationManager::new(store.clone()),
            decoy_hash: DecoyHash::default(),
            store,
            config,
        })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Planetarium API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
