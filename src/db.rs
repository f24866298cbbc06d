use std::time::{Duration, Instant};

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, error, info};

use crate::{config::AppConfig, errors::ServiceError, migrator::Migrator};

pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Opens the pool. SQLite connections have foreign keys enforced, which the
/// product and order cascades rely on.
pub async fn connect(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await.map_err(|e| {
        error!(error = %e, "could not open database pool");
        ServiceError::db_error(e)
    })?;
    info!(
        backend = ?pool.get_database_backend(),
        max_connections = config.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    connect(&DbConfig::from(cfg)).await
}

/// Applies pending migrations; a no-op when the schema is current.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "migrations applied");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "migrations failed");
            Err(ServiceError::db_error(e))
        }
    }
}

/// Round-trip to the database, used by `/health`.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    pool.ping().await.map_err(|e| {
        error!(error = %e, "database ping failed");
        ServiceError::db_error(e)
    })?;
    debug!(elapsed_us = started.elapsed().as_micros() as u64, "database ping ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_apply_twice_on_fresh_sqlite() {
        let mut config = DbConfig::new("sqlite::memory:");
        config.max_connections = 1;

        let pool = connect(&config).await.unwrap();
        check_connection(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
    }
}
