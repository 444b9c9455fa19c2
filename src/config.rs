use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "sqlite://tasklists.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_INITIAL_LIST_NAME: &str = "My Tasks";
const DEFAULT_LOG_FILTER: &str = "tasklists=debug";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub initial_list_name: String,
    pub log_filter: String,
}

impl Config {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR is invalid: {}", e)))?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "DB_MAX_CONNECTIONS must be a positive integer, got `{}`",
                        raw
                    ))
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let initial_list_name = lookup("INITIAL_LIST_NAME")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_INITIAL_LIST_NAME.to_string());

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            initial_list_name,
            log_filter,
        })
    }
}
