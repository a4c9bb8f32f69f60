//! User identity models

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity a token is bound to. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub email: String,
}

impl Identity {
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Identity plus its stored password hash, for credential checks only.
#[derive(Clone, sqlx::FromRow)]
pub struct StoredCredentials {
    #[sqlx(flatten)]
    pub identity: Identity,
    pub password_hash: String,
}

impl StoredCredentials {
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("identity", &self.identity)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}
