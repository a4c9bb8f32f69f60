//! 认证核心命令行入口
//! 迁移数据库、为用户签发令牌、校验令牌

use anyhow::Context;
use blog_auth::{
    auth::TokenProvider,
    config::AppConfig,
    db,
    repository::{RefreshTokenRepository, UserRepository},
    services::{AuthService, TokenPair},
    telemetry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        Some("--version") => {
            println!("blog-auth {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") | None => {
            print_help();
            return Ok(());
        }
        Some("migrate") => Command::Migrate,
        Some("issue-token") => {
            let user_id = args
                .get(2)
                .context("issue-token 需要 <user-id> 参数")?
                .parse::<i64>()
                .context("<user-id> 必须是整数")?;
            Command::IssueToken(user_id)
        }
        Some("verify-token") => {
            let token = args.get(2).context("verify-token 需要 <token> 参数")?;
            Command::VerifyToken(token.clone())
        }
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("BLOG_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    let token_provider = Arc::new(TokenProvider::from_config(&config)?);

    match command {
        Command::Migrate => {
            let pool = db::create_pool(&config.database).await?;
            let status = db::run_migrations(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::IssueToken(user_id) => {
            let pool = db::create_pool(&config.database).await?;
            let users = Arc::new(UserRepository::new(pool.clone()));
            let refresh_tokens = Arc::new(RefreshTokenRepository::new(pool));
            let service = AuthService::from_config(users, refresh_tokens, token_provider, &config)?;

            let pair = issue_for_user(&service, user_id, config.session.access_token_ttl_secs).await?;
            println!("{}", serde_json::to_string_pretty(&pair)?);
        }
        Command::VerifyToken(token) => match token_provider.parse_and_verify(&token) {
            Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
            Err(e) => {
                eprintln!("invalid token: {}", e);
                std::process::exit(2);
            }
        },
    }

    Ok(())
}

enum Command {
    Migrate,
    IssueToken(i64),
    VerifyToken(String),
}

/// 为已存在的用户签发访问令牌并轮换刷新令牌
async fn issue_for_user(
    service: &AuthService,
    user_id: i64,
    ttl_secs: u64,
) -> anyhow::Result<TokenPair> {
    let refresh_token = service.issue_or_rotate(user_id).await?;
    let access_token = service.create_new_access_token(&refresh_token).await?;

    tracing::info!(user_id, "Issued token pair from CLI");

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: ttl_secs,
    })
}

/// 打印帮助信息
fn print_help() {
    println!("blog-auth {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: blog-auth <命令> [参数]");
    println!();
    println!("命令:");
    println!("  migrate                 执行数据库迁移");
    println!("  issue-token <user-id>   为用户签发访问令牌与刷新令牌");
    println!("  verify-token <token>    校验访问令牌并打印其声明");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 BLOG_ 前缀的环境变量完成");
    println!("  可用选项请参考 .env.example");
}
