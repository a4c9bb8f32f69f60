//! Authenticated principal handed to the authorization gate

use serde::{Deserialize, Serialize};

/// Authority granted to an authenticated principal.
///
/// Only one role is recognised today. Tokens may carry a `role` claim so more
/// variants can be added without changing the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
}

impl Role {
    pub fn authority(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
        }
    }
}

/// Request-scoped identity built from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Token subject (the account email)
    pub username: String,
    /// `id` claim, when the token carries one
    pub user_id: Option<i64>,
    pub authorities: Vec<Role>,
}

impl Principal {
    /// Principal with the single user-level authority.
    pub fn user(username: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            username: username.into(),
            user_id,
            authorities: vec![Role::User],
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.authorities.contains(&role)
    }
}
