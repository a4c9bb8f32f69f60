//! In-process stores backed by `DashMap`.
//!
//! Used for tests and single-process deployments. Each map shard is locked
//! independently, so writes for different users rarely contend while writes
//! for one user serialize on its entry.

use super::{CredentialStore, RefreshTokenStore};
use crate::{
    error::AppError,
    models::{Identity, RefreshToken, StoredCredentials},
};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    next_id: AtomicI64,
    by_email: DashMap<String, StoredCredentials>,
    emails_by_id: DashMap<i64, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<Identity, AppError> {
        match self.by_email.entry(email.to_string()) {
            Entry::Occupied(_) => Err(AppError::Conflict("Email already registered".to_string())),
            Entry::Vacant(slot) => {
                let identity = Identity::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1, email);
                self.emails_by_id.insert(identity.id, email.to_string());
                slot.insert(StoredCredentials {
                    identity: identity.clone(),
                    password_hash: password_hash.to_string(),
                });
                Ok(identity)
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredCredentials>, AppError> {
        Ok(self.by_email.get(email).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        let Some(email) = self.emails_by_id.get(&id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };

        Ok(self
            .by_email
            .get(&email)
            .map(|entry| entry.value().identity.clone()))
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let email = self
            .emails_by_id
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::UnknownIdentity)?;

        let mut stored = self
            .by_email
            .get_mut(&email)
            .ok_or(AppError::UnknownIdentity)?;
        stored.password_hash = password_hash.to_string();

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    next_id: AtomicI64,
    by_user: DashMap<i64, RefreshToken>,
    users_by_value: DashMap<String, i64>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens (one per user)
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    // Lock order: `by_user` entry first, then `users_by_value`.
    // A value held by another user is a conflict, as with the unique column in Postgres.
    fn reindex(&self, user_id: i64, old_value: Option<&str>, new_value: &str) -> Result<(), AppError> {
        match self.users_by_value.entry(new_value.to_string()) {
            Entry::Occupied(holder) if *holder.get() != user_id => {
                return Err(AppError::Conflict("Refresh token value already in use".to_string()));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(user_id);
            }
        }

        if let Some(old) = old_value.filter(|old| *old != new_value) {
            self.users_by_value.remove(old);
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn upsert(&self, user_id: i64, token_value: &str) -> Result<RefreshToken, AppError> {
        match self.by_user.entry(user_id) {
            Entry::Occupied(mut slot) => {
                let old_value = slot.get().token_value.clone();
                self.reindex(user_id, Some(&old_value), token_value)?;

                let token = slot.get_mut();
                token.token_value = token_value.to_string();
                Ok(token.clone())
            }
            Entry::Vacant(slot) => {
                self.reindex(user_id, None, token_value)?;
                let token = RefreshToken {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    user_id,
                    token_value: token_value.to_string(),
                };
                slot.insert(token.clone());
                Ok(token)
            }
        }
    }

    async fn save(&self, token: &RefreshToken) -> Result<RefreshToken, AppError> {
        let mut stored = self
            .by_user
            .get_mut(&token.user_id)
            .filter(|stored| stored.id == token.id)
            .ok_or_else(|| AppError::BadRequest(format!("Refresh token {} does not exist", token.id)))?;

        let old_value = stored.token_value.clone();
        self.reindex(token.user_id, Some(&old_value), &token.token_value)?;
        stored.token_value = token.token_value.clone();

        Ok(stored.clone())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.by_user.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn find_by_value(&self, token_value: &str) -> Result<Option<RefreshToken>, AppError> {
        let Some(user_id) = self.users_by_value.get(token_value).map(|entry| *entry.value()) else {
            return Ok(None);
        };

        Ok(self
            .by_user
            .get(&user_id)
            .filter(|token| token.token_value == token_value)
            .map(|token| token.value().clone()))
    }
}
