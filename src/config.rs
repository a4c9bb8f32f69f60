//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use base64::{engine::general_purpose::STANDARD, Engine as _};
use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// HS256 密钥的最小字节数
pub const MIN_SECRET_KEY_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

/// Token signing material. Loaded once at startup and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    /// Embedded as `iss` in every issued token
    pub issuer: String,
    /// Base64-encoded HMAC key shared by issuer and verifier
    pub secret_key: Secret<String>,
}

impl SigningConfig {
    pub fn new(issuer: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            secret_key: Secret::new(secret_key.into()),
        }
    }

    /// Decode the configured secret into raw key bytes.
    pub fn key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        let bytes = STANDARD
            .decode(self.secret_key.expose_secret().trim())
            .map_err(|e| ConfigError::Message(format!("jwt.secret_key is not valid base64: {}", e)))?;

        if bytes.len() < MIN_SECRET_KEY_BYTES {
            return Err(ConfigError::Message(format!(
                "jwt.secret_key must decode to at least {} bytes",
                MIN_SECRET_KEY_BYTES
            )));
        }

        Ok(bytes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 访问令牌有效期（秒）
    pub access_token_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// 密码最小长度
    pub min_length: usize,
    /// Argon2 内存开销（KiB）
    pub memory_kib: u32,
    /// Argon2 迭代次数
    pub iterations: u32,
    /// Argon2 并行度
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub jwt: SigningConfig,
    pub session: SessionConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let password_defaults = PasswordConfig::default();
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("session.access_token_ttl_secs", 7200)?
            .set_default("password.min_length", password_defaults.min_length as i64)?
            .set_default("password.memory_kib", password_defaults.memory_kib as i64)?
            .set_default("password.iterations", password_defaults.iterations as i64)?
            .set_default("password.parallelism", password_defaults.parallelism as i64)?;

        // 从环境变量加载配置（前缀为 BLOG_）
        settings = settings.add_source(
            Environment::with_prefix("BLOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        if self.jwt.issuer.trim().is_empty() {
            return Err(ConfigError::Message("jwt.issuer must not be empty".to_string()));
        }

        self.jwt.key_bytes()?;

        if self.session.access_token_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "session.access_token_ttl_secs must be positive".to_string(),
            ));
        }

        // 验证密码策略
        if self.password.min_length < 6 || self.password.min_length > 128 {
            return Err(ConfigError::Message(
                "password.min_length must be between 6 and 128".to_string(),
            ));
        }

        Ok(())
    }
}
