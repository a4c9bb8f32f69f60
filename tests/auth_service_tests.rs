//! 认证服务测试
//!
//! 基于内存存储测试注册、登录、刷新令牌轮换与访问令牌续期

mod common;

use blog_auth::{
    auth::Role,
    error::{AppError, TokenError},
    repository::{CredentialStore, RefreshTokenStore},
};
use blog_auth::config::PasswordConfig;
use common::*;
use std::time::{Duration, Instant};

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "TestPass123";

// ==================== 注册 ====================

#[tokio::test]
async fn test_register_stores_hashed_password() {
    let h = memory_harness();

    let identity = h.service.register(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(identity.email, EMAIL);

    let stored = h.users.find_by_email(EMAIL).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, PASSWORD);
    assert!(h.hasher.verify(PASSWORD, &stored.password_hash).unwrap());
}

#[tokio::test]
async fn test_register_rejects_duplicate_and_weak_input() {
    let h = memory_harness();
    h.service.register(EMAIL, PASSWORD).await.unwrap();

    assert!(matches!(
        h.service.register(EMAIL, "Another123").await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        h.service.register("other@example.com", "short").await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        h.service.register("   ", PASSWORD).await,
        Err(AppError::BadRequest(_))
    ));
    assert_eq!(h.users.len(), 1);
}

// ==================== 登录 ====================

#[tokio::test]
async fn test_login_issues_token_pair() {
    let h = memory_harness();
    let identity = h.service.register(EMAIL, PASSWORD).await.unwrap();

    let pair = h.service.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(pair.expires_in, create_test_config().session.access_token_ttl_secs);
    assert_eq!(pair.refresh_token.len(), 64);
    assert_ne!(pair.access_token, pair.refresh_token);

    let claims = h.service.token_provider().decode(&pair.access_token).unwrap();
    assert_eq!(claims.id, Some(identity.id));
    assert_eq!(claims.sub, EMAIL);

    let stored = h.refresh_tokens.find_by_user(identity.id).await.unwrap().unwrap();
    assert_eq!(stored.token_value, pair.refresh_token);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let h = memory_harness();
    h.service.register(EMAIL, PASSWORD).await.unwrap();

    let unknown = h.service.login("nobody@example.com", PASSWORD).await.unwrap_err();
    let wrong = h.service.login(EMAIL, "WrongPass123").await.unwrap_err();

    assert!(matches!(unknown, AppError::InvalidCredentials));
    assert!(matches!(wrong, AppError::InvalidCredentials));
    assert_eq!(unknown.user_message(), wrong.user_message());
    assert!(h.refresh_tokens.is_empty());
}

async fn average_login_time(h: &MemoryHarness, email: &str, password: &str, rounds: u32) -> Duration {
    let start = Instant::now();
    for _ in 0..rounds {
        let err = h.service.login(email, password).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }
    start.elapsed() / rounds
}

#[tokio::test]
async fn test_unknown_email_costs_a_password_hash() {
    // 足够慢的参数，使哈希耗时远大于内存查找
    let h = memory_harness_with(PasswordConfig {
        min_length: 8,
        memory_kib: 8192,
        iterations: 3,
        parallelism: 1,
    });
    h.service.register(EMAIL, PASSWORD).await.unwrap();

    let unknown = average_login_time(&h, "nobody@example.com", PASSWORD, 5).await;
    let wrong = average_login_time(&h, EMAIL, "WrongPass123", 5).await;

    assert!(
        unknown * 4 >= wrong,
        "unknown email took {:?}, wrong password took {:?}",
        unknown,
        wrong
    );
}

#[tokio::test]
async fn test_login_upgrades_legacy_bcrypt_hash() {
    let h = memory_harness();
    let legacy = bcrypt::hash(PASSWORD, 4).unwrap();
    h.users.create(EMAIL, &legacy).await.unwrap();

    h.service.login(EMAIL, PASSWORD).await.unwrap();

    let stored = h.users.find_by_email(EMAIL).await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"));
    assert!(!h.hasher.needs_rehash(&stored.password_hash));

    // 升级后仍可登录
    h.service.login(EMAIL, PASSWORD).await.unwrap();
}

// ==================== 刷新令牌 ====================

#[tokio::test]
async fn test_issue_or_rotate_keeps_one_token_per_user() {
    let h = memory_harness();

    let first = h.service.issue_or_rotate(7).await.unwrap();
    let second = h.service.issue_or_rotate(7).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(h.refresh_tokens.len(), 1);

    let current = h.service.refresh_tokens().find_by_user(7).await.unwrap().unwrap();
    assert_eq!(current.token_value, second);
    assert!(h.refresh_tokens.find_by_value(&first).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_tokens_are_per_user() {
    let h = memory_harness();

    let a = h.service.issue_or_rotate(1).await.unwrap();
    let b = h.service.issue_or_rotate(2).await.unwrap();

    assert_eq!(h.refresh_tokens.len(), 2);
    assert_eq!(h.refresh_tokens.find_by_value(&a).await.unwrap().unwrap().user_id, 1);
    assert_eq!(h.refresh_tokens.find_by_value(&b).await.unwrap().unwrap().user_id, 2);
}

#[tokio::test]
async fn test_create_new_access_token() {
    let h = memory_harness();
    let identity = h.service.register(EMAIL, PASSWORD).await.unwrap();
    let pair = h.service.login(EMAIL, PASSWORD).await.unwrap();

    let access = h.service.create_new_access_token(&pair.refresh_token).await.unwrap();
    assert_eq!(h.service.token_provider().get_user_id(&access), Ok(identity.id));

    // 续期不会轮换刷新令牌
    let stored = h.refresh_tokens.find_by_user(identity.id).await.unwrap().unwrap();
    assert_eq!(stored.token_value, pair.refresh_token);
}

#[tokio::test]
async fn test_create_new_access_token_failures() {
    let h = memory_harness();

    assert!(matches!(
        h.service.create_new_access_token("").await,
        Err(AppError::Unauthorized)
    ));
    assert!(matches!(
        h.service.create_new_access_token("unknown-value").await,
        Err(AppError::Unauthorized)
    ));

    // 刷新令牌存在但用户已不存在
    let orphan = h.service.issue_or_rotate(999).await.unwrap();
    assert!(matches!(
        h.service.create_new_access_token(&orphan).await,
        Err(AppError::UnknownIdentity)
    ));
}

#[tokio::test]
async fn test_rotated_out_value_no_longer_refreshes() {
    let h = memory_harness();
    h.service.register(EMAIL, PASSWORD).await.unwrap();

    let first = h.service.login(EMAIL, PASSWORD).await.unwrap();
    let second = h.service.login(EMAIL, PASSWORD).await.unwrap();

    assert!(matches!(
        h.service.create_new_access_token(&first.refresh_token).await,
        Err(AppError::Unauthorized)
    ));
    assert!(h.service.create_new_access_token(&second.refresh_token).await.is_ok());
}

// ==================== 认证 ====================

#[tokio::test]
async fn test_authenticate_and_current_identity() {
    let h = memory_harness();
    let identity = h.service.register(EMAIL, PASSWORD).await.unwrap();
    let pair = h.service.login(EMAIL, PASSWORD).await.unwrap();

    let principal = h.service.authenticate(&pair.access_token).unwrap();
    assert_eq!(principal.username, EMAIL);
    assert_eq!(principal.authorities, vec![Role::User]);

    assert_eq!(h.service.current_identity(&pair.access_token).await.unwrap(), identity);

    let err = h.service.authenticate("garbage").unwrap_err();
    assert!(matches!(err, AppError::Token(TokenError::Malformed)));
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_current_identity_requires_id_claim() {
    let h = memory_harness();

    assert!(matches!(
        h.service.current_identity(&token_without_id()).await,
        Err(AppError::Token(TokenError::MissingClaim("id")))
    ));
}
