use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

/// Shared handle to the backing store (Postgres in production, SQLite in tests)
pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
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
        let secs = Duration::from_secs;
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: secs(cfg.db_connect_timeout_secs),
            idle_timeout: secs(cfg.db_idle_timeout_secs),
            acquire_timeout: secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Opens the pool with sqlx statement logging off.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!(
        max = config.max_connections,
        min = config.min_connections,
        "opening database pool"
    );

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    match Database::connect(options).await {
        Ok(pool) => {
            info!("database pool ready");
            Ok(pool)
        }
        Err(e) => {
            error!(error = %e, "could not open database pool");
            Err(e)
        }
    }
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Brings the schema up to date; already applied migrations are skipped.
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    let pending = Migrator::get_pending_migrations(db).await?.len();
    if pending == 0 {
        debug!("schema up to date");
        return Ok(());
    }

    info!(pending, "applying migrations");
    if let Err(e) = Migrator::up(db, None).await {
        error!(error = %e, "migration failed");
        return Err(e);
    }
    Ok(())
}

/// Bounds a store call; elapsed time surfaces as `ServiceError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, op: &str, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!(operation = op, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(ServiceError::Timeout(format!(
                "{} exceeded {}ms",
                op,
                limit.as_millis()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn slow_store_call_maps_to_timeout() {
        let result: Result<(), ServiceError> =
            with_timeout(Duration::from_millis(10), "slow_query", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert_matches!(result, Err(ServiceError::Timeout(msg)) if msg.contains("slow_query"));
    }

    #[tokio::test]
    async fn fast_store_call_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), "fast", async {
            Err::<(), _>(ServiceError::NotFound("x".into()))
        })
        .await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn migrations_apply_to_in_memory_sqlite() {
        let cfg = DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let db = establish_connection_with_config(&cfg).await.unwrap();
        run_migrations(&db).await.unwrap();
        // second run is a no-op
        run_migrations(&db).await.unwrap();
    }
}
