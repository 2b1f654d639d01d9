//! 建立数据库连接并执行迁移

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{debug, info};

use crate::errors::{DubError, Result};
use migration::{Migrator, MigratorTrait};

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// 按后端类型建立连接；`pool_size` 只对 MySQL / PostgreSQL 生效
pub async fn connect(database_url: &str, backend: &str, pool_size: u32) -> Result<DatabaseConnection> {
    debug!("Connecting to {} database", backend);
    match backend {
        "sqlite" => connect_sqlite(database_url).await,
        _ => connect_pooled(database_url, backend, pool_size).await,
    }
}

/// SQLite：文件不存在时创建，WAL + NORMAL 同步
async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
    use sea_orm::SqlxSqliteConnector;
    use sea_orm::sqlx::SqlitePool;
    use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DubError::database_config(format!("Invalid SQLite URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(|e| DubError::database_connection(format!("SQLite connection failed: {}", e)))?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn connect_pooled(database_url: &str, backend: &str, pool_size: u32) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(pool_size.max(1))
        .min_connections(pool_size.clamp(1, 5))
        .connect_timeout(POOL_CONNECT_TIMEOUT)
        .acquire_timeout(POOL_CONNECT_TIMEOUT)
        .idle_timeout(POOL_IDLE_TIMEOUT)
        .max_lifetime(POOL_MAX_LIFETIME)
        .sqlx_logging(false);

    Database::connect(options).await.map_err(|e| {
        DubError::database_connection(format!("{} connection failed: {}", backend, e))
    })
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| DubError::database_operation(format!("Migration failed: {}", e)))?;
    info!("Database schema is up to date");
    Ok(())
}
