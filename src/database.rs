use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::{StoreError, StoreResult};

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!("Database pool ready ({} connections)", pool_size);
        Ok(Database { pool })
    }

    /// Connects using the `database` section of the configuration.
    pub async fn from_config(config: &DatabaseConfig) -> StoreResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Database(sqlx::Error::Configuration("DATABASE_URL is not set".into())))?;
        Self::new(url, config.pool_size).await
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running planetarium schema migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}
