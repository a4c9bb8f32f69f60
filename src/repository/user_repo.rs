//! User repository (用户数据访问)

use super::CredentialStore;
use crate::{
    error::AppError,
    models::{Identity, StoredCredentials},
};
use async_trait::async_trait;
use sqlx::PgPool;

const UNIQUE_VIOLATION: &str = "23505";

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for UserRepository {
    /// 创建用户
    async fn create(&self, email: &str, password_hash: &str) -> Result<Identity, AppError> {
        let result = sqlx::query_as::<_, Identity>(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id, email",
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(identity) => Ok(identity),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AppError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 根据邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, AppError> {
        let user = sqlx::query_as::<_, StoredCredentials>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        let user = sqlx::query_as::<_, Identity>("SELECT id, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 更新密码哈希
    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UnknownIdentity);
        }

        Ok(())
    }
}
