//! 博客认证核心库
//! 提供无状态 JWT 访问令牌、密码校验与刷新令牌管理

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;
