//! Server settings read from the environment at startup.

use std::net::SocketAddr;

use bizbooks_infra::config::{ConfigError, env_var, parse_env, parse_flag};
use bizbooks_infra::{ActivityLogConfig, LedgerConfig};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; the in-memory store is used without one.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub repair_on_startup: bool,
    pub seed_demo_data: bool,
    pub ledger: LedgerConfig,
    pub activity: ActivityLogConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = match parse_env::<SocketAddr>("BIND_ADDR")? {
            Some(addr) => addr,
            None => DEFAULT_BIND_ADDR.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: DEFAULT_BIND_ADDR.to_string(),
            })?,
        };

        Ok(Self {
            bind_addr,
            database_url: env_var("DATABASE_URL"),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10),
            repair_on_startup: parse_flag("REPAIR_ON_STARTUP")?.unwrap_or(true),
            seed_demo_data: parse_flag("SEED_DEMO_DATA")?.unwrap_or(false),
            ledger: LedgerConfig::from_env()?,
            activity: ActivityLogConfig::from_env()?,
        })
    }
}
