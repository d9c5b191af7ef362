use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub lock_timeout_ms: u64,
    pub notification_webhook_url: Option<String>,
    pub notification_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = get_or(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(Error::Config(
                "Missing environment variable: DATABASE_URL".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_required(&lookup, "SERVER_ADDRESS")?,
            store_backend,
            database_url,
            db_max_connections: get_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            lock_timeout_ms: get_or(&lookup, "LOCK_TIMEOUT_MS", 5000)?,
            notification_webhook_url: lookup("NOTIFICATION_WEBHOOK_URL").filter(|v| !v.is_empty()),
            notification_timeout_secs: get_or(&lookup, "NOTIFICATION_TIMEOUT_SECS", 10)?,
            log_format: get_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        })
    }
}

fn get_required<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}
