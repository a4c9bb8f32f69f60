//! 数据库连接池与迁移
//! 迁移完成后回读库表状态，作为 `migrate` 命令的结果

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 迁移后的库表状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SchemaStatus {
    pub applied_migrations: i64,
    pub users: i64,
    pub refresh_tokens: i64,
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Schema check failed: {0}")]
    Schema(#[source] sqlx::Error),
}

/// 按配置构建连接池参数
pub fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
}

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let pool = pool_options(config)
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            DbError::Connect(e)
        })?;

    tracing::debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool ready"
    );

    Ok(pool)
}

/// 执行迁移并返回迁移后的库表状态
pub async fn run_migrations(pool: &PgPool) -> Result<SchemaStatus, DbError> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Migration failed");
        DbError::from(e)
    })?;

    let status = schema_status(pool).await?;
    tracing::info!(
        applied_migrations = status.applied_migrations,
        users = status.users,
        refresh_tokens = status.refresh_tokens,
        "Schema up to date"
    );

    Ok(status)
}

/// 读取库表状态；表缺失或连接异常时报错
pub async fn schema_status(pool: &PgPool) -> Result<SchemaStatus, DbError> {
    sqlx::query_as::<_, SchemaStatus>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM _sqlx_migrations WHERE success) AS applied_migrations,
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM refresh_tokens) AS refresh_tokens
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(DbError::Schema)
}
