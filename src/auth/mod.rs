//! Authentication core: access tokens, password hashing, principals

pub mod jwt;
pub mod password;
pub mod principal;

pub use jwt::{Claims, TokenProvider};
pub use password::PasswordHasher;
pub use principal::{Principal, Role};
