use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub token_ttl_days: i64,
    pub tag_cache_ttl_secs: u64,
    pub db_max_connections: u32,
    pub repair_counters_on_start: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://conduit.db")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "3001")?,
            token_ttl_days: try_load("TOKEN_TTL_DAYS", "90")?,
            tag_cache_ttl_secs: try_load("TAG_CACHE_TTL_SECS", "60")?,
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            repair_counters_on_start: try_load("REPAIR_COUNTERS_ON_START", "false")?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("Invalid {key} value {raw:?}: {e}")
    })
}
