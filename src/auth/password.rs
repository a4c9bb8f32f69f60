//! Password hashing and verification using Argon2id
//!
//! New hashes are Argon2id PHC strings. Hashes written by the previous bcrypt
//! based signup flow still verify and are reported by `needs_rehash`.

use crate::{config::PasswordConfig, error::AppError};
use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with the Argon2 crate's default cost (OWASP baseline)
    pub fn new() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self, AppError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// `Ok(false)` means the password is wrong; `Err` means the stored hash
    /// itself cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        if is_bcrypt(hash) {
            return bcrypt::verify(password, hash).map_err(|e| {
                tracing::debug!("Failed to verify bcrypt hash: {:?}", e);
                AppError::Internal(format!("Failed to parse password hash: {}", e))
            });
        }

        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            AppError::Internal(format!("Failed to parse password hash: {}", e))
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                tracing::debug!("Failed to verify password hash: {:?}", e);
                Err(AppError::Internal(format!("Failed to verify password hash: {}", e)))
            }
        }
    }

    /// Whether a stored hash should be replaced by a fresh Argon2id hash
    pub fn needs_rehash(&self, hash: &str) -> bool {
        is_bcrypt(hash)
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, config: &PasswordConfig) -> Result<(), AppError> {
        if password.chars().count() < config.min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                config.min_length
            )));
        }

        if password.trim().is_empty() {
            return Err(AppError::BadRequest("Password must not be blank".to_string()));
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn is_bcrypt(hash: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix))
}
