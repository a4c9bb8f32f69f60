//! Refresh token repository (刷新令牌数据访问)

use super::RefreshTokenStore;
use crate::{error::AppError, models::RefreshToken};
use async_trait::async_trait;
use sqlx::PgPool;

const UNIQUE_VIOLATION: &str = "23505";

/// 刷新令牌值已被其他用户占用
fn map_value_conflict(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::Conflict("Refresh token value already in use".to_string())
        }
        other => other.into(),
    }
}

pub struct RefreshTokenRepository {
    db: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenRepository {
    /// 创建或轮换刷新令牌（user_id 唯一约束保证每个用户只有一行）
    async fn upsert(&self, user_id: i64, token_value: &str) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, refresh_token)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET refresh_token = EXCLUDED.refresh_token, updated_at = NOW()
            RETURNING id, user_id, refresh_token
            "#,
        )
        .bind(user_id)
        .bind(token_value)
        .fetch_one(&self.db)
        .await
        .map_err(map_value_conflict)?;

        Ok(token)
    }

    /// 保存已更新的刷新令牌
    async fn save(&self, token: &RefreshToken) -> Result<RefreshToken, AppError> {
        let saved = sqlx::query_as::<_, RefreshToken>(
            r#"
            UPDATE refresh_tokens
            SET refresh_token = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, refresh_token
            "#,
        )
        .bind(token.id)
        .bind(&token.token_value)
        .fetch_optional(&self.db)
        .await
        .map_err(map_value_conflict)?;

        saved.ok_or_else(|| AppError::BadRequest(format!("Refresh token {} does not exist", token.id)))
    }

    /// 根据用户查找刷新令牌
    async fn find_by_user(&self, user_id: i64) -> Result<Option<RefreshToken>, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, refresh_token FROM refresh_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(token)
    }

    /// 根据令牌值查找刷新令牌
    async fn find_by_value(&self, token_value: &str) -> Result<Option<RefreshToken>, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, refresh_token FROM refresh_tokens WHERE refresh_token = $1",
        )
        .bind(token_value)
        .fetch_optional(&self.db)
        .await?;

        Ok(token)
    }
}
