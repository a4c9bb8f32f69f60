//! Database repository layer
//!
//! The auth core reaches persistence only through [`CredentialStore`] and
//! [`RefreshTokenStore`]. Postgres and in-process implementations are provided.

pub mod memory;
pub mod refresh_token_repo;
pub mod user_repo;

use crate::{
    error::AppError,
    models::{Identity, RefreshToken, StoredCredentials},
};
use async_trait::async_trait;

pub use memory::{MemoryCredentialStore, MemoryRefreshTokenStore};
pub use refresh_token_repo::RefreshTokenRepository;
pub use user_repo::UserRepository;

/// User identities and their password hashes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new identity; a taken email yields `AppError::Conflict`.
    async fn create(&self, email: &str, password_hash: &str) -> Result<Identity, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError>;

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError>;
}

/// At most one refresh token per user.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Create the user's token or overwrite its value in place.
    /// Concurrent calls for one user serialize here.
    async fn upsert(&self, user_id: i64, token_value: &str) -> Result<RefreshToken, AppError>;

    /// Persist a token mutated with [`RefreshToken::update`].
    async fn save(&self, token: &RefreshToken) -> Result<RefreshToken, AppError>;

    async fn find_by_user(&self, user_id: i64) -> Result<Option<RefreshToken>, AppError>;

    async fn find_by_value(&self, token_value: &str) -> Result<Option<RefreshToken>, AppError>;
}
