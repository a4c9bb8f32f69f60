//! 认证服务：注册、登录、刷新令牌与访问令牌续期

use crate::{
    auth::{PasswordHasher, Principal, TokenProvider},
    config::{AppConfig, PasswordConfig},
    error::AppError,
    models::Identity,
    repository::{CredentialStore, RefreshTokenStore},
};
use chrono::Duration;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::sync::Arc;

/// Length of generated refresh token values
const REFRESH_TOKEN_LENGTH: usize = 64;

/// Verified against when the email is unknown, so both login failures cost one hash
const DUMMY_PASSWORD: &str = "blog-auth-dummy-password";

/// Token pair returned by a successful login
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64, // seconds until access token expires
}

pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    token_provider: Arc<TokenProvider>,
    hasher: PasswordHasher,
    dummy_hash: String,
    password_policy: PasswordConfig,
    access_token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        token_provider: Arc<TokenProvider>,
        hasher: PasswordHasher,
        access_token_ttl: Duration,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;

        Ok(Self {
            users,
            refresh_tokens,
            token_provider,
            hasher,
            dummy_hash,
            password_policy: PasswordConfig::default(),
            access_token_ttl,
        })
    }

    pub fn from_config(
        users: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        token_provider: Arc<TokenProvider>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        let hasher = PasswordHasher::from_config(&config.password)?;
        let ttl = Duration::seconds(config.session.access_token_ttl_secs as i64);

        Ok(Self::new(users, refresh_tokens, token_provider, hasher, ttl)?
            .with_password_policy(config.password.clone()))
    }

    pub fn with_password_policy(mut self, policy: PasswordConfig) -> Self {
        self.password_policy = policy;
        self
    }

    pub fn token_provider(&self) -> &TokenProvider {
        &self.token_provider
    }

    pub fn refresh_tokens(&self) -> &dyn RefreshTokenStore {
        self.refresh_tokens.as_ref()
    }

    /// 用户注册
    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::BadRequest("Email must not be empty".to_string()));
        }
        PasswordHasher::validate_password_policy(password, &self.password_policy)?;

        let password_hash = self.hash_password(password).await?;
        let identity = self.users.create(email, &password_hash).await?;

        tracing::info!(user_id = identity.id, "User registered");
        Ok(identity)
    }

    /// 用户登录
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let Some(stored) = self.users.find_by_email(email.trim()).await? else {
            // Same hashing cost as a wrong password.
            self.verify_password(password, &self.dummy_hash).await?;
            tracing::debug!("Login failed: unknown account");
            return Err(AppError::InvalidCredentials);
        };

        if !self.verify_password(password, &stored.password_hash).await? {
            tracing::debug!(user_id = stored.identity.id, "Login failed: password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        if self.hasher.needs_rehash(&stored.password_hash) {
            self.upgrade_password_hash(stored.identity.id, password).await;
        }

        let identity = stored.into_identity();
        let access_token = self.issue_access_token(&identity)?;
        let refresh_token = self.issue_or_rotate(identity.id).await?;

        tracing::info!(user_id = identity.id, "Login succeeded");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_token_ttl.num_seconds() as u64,
        })
    }

    /// 签发访问令牌
    pub fn issue_access_token(&self, identity: &Identity) -> Result<String, AppError> {
        Ok(self
            .token_provider
            .generate_token(identity, self.access_token_ttl)?)
    }

    /// 创建或轮换用户的刷新令牌，返回新的令牌值
    pub async fn issue_or_rotate(&self, user_id: i64) -> Result<String, AppError> {
        let value = generate_refresh_token_value();
        let token = self.refresh_tokens.upsert(user_id, &value).await?;

        tracing::debug!(user_id, refresh_token_id = token.id, "Refresh token issued");
        Ok(token.token_value)
    }

    /// 使用刷新令牌换取新的访问令牌
    pub async fn create_new_access_token(&self, refresh_token: &str) -> Result<String, AppError> {
        if refresh_token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let token = self
            .refresh_tokens
            .find_by_value(refresh_token)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Unknown refresh token presented");
                AppError::Unauthorized
            })?;

        let identity = self
            .users
            .find_by_id(token.user_id)
            .await?
            .ok_or(AppError::UnknownIdentity)?;

        self.issue_access_token(&identity)
    }

    /// Validate an access token and build its principal
    pub fn authenticate(&self, token: &str) -> Result<Principal, AppError> {
        Ok(self.token_provider.get_authentication(token)?)
    }

    /// Resolve the stored identity behind an access token
    pub async fn current_identity(&self, token: &str) -> Result<Identity, AppError> {
        let user_id = self.token_provider.get_user_id(token)?;

        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UnknownIdentity)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    // Failure keeps the legacy hash; the login itself already succeeded.
    async fn upgrade_password_hash(&self, user_id: i64, password: &str) {
        let result = match self.hash_password(password).await {
            Ok(hash) => self.users.update_password_hash(user_id, &hash).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!(user_id, "Upgraded legacy password hash"),
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to upgrade legacy password hash"),
        }
    }
}

/// Random opaque refresh token value
fn generate_refresh_token_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
