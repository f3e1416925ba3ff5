use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::metrics::{TRANSACTIONS_COMMITTED, TRANSACTIONS_ROLLED_BACK};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Boxed future a transactional callback returns
pub type TxnFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'c>>;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
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

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(
        max_connections = config.max_connections,
        "Configuring database connection"
    );

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "Database connection establishment failed");
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish the primary DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Connects the read-only vehicle registry, if one is configured
pub async fn establish_vehicle_connection(
    cfg: &AppConfig,
) -> Result<Option<DbPool>, ServiceError> {
    let Some(url) = cfg.vehicle_database_url.as_ref() else {
        info!("Vehicle database not configured; VIN lookups disabled");
        return Ok(None);
    };

    let db_cfg = DbConfig {
        url: url.clone(),
        max_connections: cfg.vehicle_db_max_connections,
        min_connections: 0,
        connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
        idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
        acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
    };
    establish_connection_with_config(&db_cfg).await.map(Some)
}

/// Database access wrapper that counts and logs transaction outcomes
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: Arc<DbPool>,
}

impl DatabaseAccess {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &DbPool {
        &self.pool
    }

    /// Runs `f` on a dedicated transactional connection.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise;
    /// the connection returns to the pool either way. Database failures raised
    /// inside `f` come back as [`ServiceError::TransactionFailed`] carrying the
    /// original message, business errors come back unchanged.
    pub async fn transaction<F, T>(&self, operation: &'static str, f: F) -> Result<T, ServiceError>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxnFuture<'c, T> + Send,
        T: Send,
    {
        let transaction_id = Uuid::new_v4();
        let start = std::time::Instant::now();
        debug!(transaction_id = %transaction_id, operation, "Starting database transaction");

        let result = self.pool.transaction::<_, T, ServiceError>(f).await;
        let elapsed = start.elapsed();

        match result {
            Ok(value) => {
                TRANSACTIONS_COMMITTED.with_label_values(&[operation]).inc();
                debug!(transaction_id = %transaction_id, operation, ?elapsed, "Transaction committed");
                Ok(value)
            }
            Err(err) => {
                TRANSACTIONS_ROLLED_BACK.with_label_values(&[operation]).inc();
                let err = ServiceError::from(err);
                warn!(transaction_id = %transaction_id, operation, ?elapsed, error = %err, "Transaction rolled back");
                Err(err)
            }
        }
    }
}

/// Runs database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = std::time::Instant::now();
    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    match &result {
        Ok(_) => debug!("Database connection check successful in {:?}", start.elapsed()),
        Err(e) => error!(
            "Database connection check failed after {:?}: {}",
            start.elapsed(),
            e
        ),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DbBackend, Statement};

    async fn memory_pool() -> DbPool {
        let cfg = DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        };
        establish_connection_with_config(&cfg).await.unwrap()
    }

    #[tokio::test]
    async fn transaction_commits_on_ok() {
        let access = DatabaseAccess::new(Arc::new(memory_pool().await));
        let value = access
            .transaction("probe", |txn| {
                Box::pin(async move {
                    txn.execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "CREATE TABLE probe (id INTEGER)".to_owned(),
                    ))
                    .await?;
                    Ok(7)
                })
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn transaction_reports_database_failure_with_original_message() {
        let access = DatabaseAccess::new(Arc::new(memory_pool().await));
        let err = access
            .transaction::<_, ()>("probe", |txn| {
                Box::pin(async move {
                    txn.execute(Statement::from_string(
                        DbBackend::Sqlite,
                        "INSERT INTO missing_table VALUES (1)".to_owned(),
                    ))
                    .await?;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        match err {
            ServiceError::TransactionFailed(msg) => assert!(msg.contains("missing_table")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn vehicle_connection_is_optional() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            0,
            "development".into(),
        );
        assert!(establish_vehicle_connection(&cfg).await.unwrap().is_none());
    }
}
