//! 统一错误模型
//! 定义所有错误类型和面向调用方的错误消息

use thiserror::Error;

/// Why a token was rejected or could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not three base64url segments, or the header/payload does not decode.
    #[error("Malformed token")]
    Malformed,

    /// Well-formed but signed with another key or altered after signing.
    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Token expired")]
    Expired,

    #[error("Token is missing the `{0}` claim")]
    MissingClaim(&'static str),

    #[error("Invalid token request: {0}")]
    InvalidRequest(String),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// Unknown email and wrong password both map here.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity not found")]
    UnknownIdentity,

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Token(_) | AppError::Unauthorized | AppError::UnknownIdentity => {
                "Authentication failed".to_string()
            }
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::Conflict(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Config(_) => "config_error",
            AppError::Token(TokenError::Expired) => "token_expired",
            AppError::Token(_) => "invalid_token",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::UnknownIdentity => "unknown_identity",
            AppError::Unauthorized => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller should treat the request as unauthenticated.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::Token(_)
                | AppError::InvalidCredentials
                | AppError::UnknownIdentity
                | AppError::Unauthorized
        )
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
