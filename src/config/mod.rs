use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

use crate::app::notifications::LikeDedup;

/// Upper bound accepted for `LIST_MAX_LIMIT`.
pub const LIST_LIMIT_CEILING: i64 = 1000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub migrations_dir: String,
    pub run_migrations: bool,
    pub like_dedup: LikeDedup,
    pub cors_allowed_origins: Vec<String>,
    pub request_body_limit_bytes: usize,
    pub list_max_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr: SocketAddr = env_or_parse("HTTP_ADDR", "0.0.0.0:8082")?;
        let app_mode = env_or("APP_MODE", "api");

        let like_dedup = if env_or_parse::<bool>("NOTIFICATION_LIKE_DEDUP", "true")? {
            LikeDedup::Enabled
        } else {
            LikeDedup::Disabled
        };

        let list_max_limit: i64 = env_or_parse("LIST_MAX_LIMIT", "200")?;
        if !(1..=LIST_LIMIT_CEILING).contains(&list_max_limit) {
            return Err(anyhow!(
                "invalid LIST_MAX_LIMIT: must be between 1 and {}",
                LIST_LIMIT_CEILING
            ));
        }

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            migrations_dir: env_or("MIGRATIONS_DIR", "migrations"),
            run_migrations: env_or_parse("RUN_MIGRATIONS", "false")?,
            like_dedup,
            cors_allowed_origins: parse_origins(&env_or("CORS_ALLOWED_ORIGINS", "*")),
            request_body_limit_bytes: env_or_parse("REQUEST_BODY_LIMIT_BYTES", "65536")?,
            list_max_limit,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

/// Splits a comma separated origin list. An empty list means "any origin".
fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(str::to_string)
        .collect()
}
