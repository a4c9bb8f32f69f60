//! Refresh token model
//!
//! One row per user. Rotation replaces `token_value` in place.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "refresh_token")]
    pub token_value: String,
}

impl RefreshToken {
    /// Replace the token value, keeping the same row identity.
    /// Persist with `RefreshTokenStore::save` to make the rotation durable.
    pub fn update(&mut self, new_value: impl Into<String>) -> &mut Self {
        self.token_value = new_value.into();
        self
    }
}
