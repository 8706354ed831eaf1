//! Configuration loading and representation.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bizbooks_core::WarehouseId;
use bizbooks_inventory::WarehouseStrategy;

/// Warehouse defaults used by the stock-moving operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Code of the warehouse used when a line names none and no warehouse
    /// holds stock.
    pub default_warehouse_code: String,
    /// Last-resort warehouse id. Assumed to exist.
    pub fallback_warehouse_id: WarehouseId,
    /// Source warehouse for production inputs.
    pub raw_materials_warehouse_code: String,
    /// Destination warehouse for production output.
    pub finished_goods_warehouse_code: String,
    /// Order in which invoice lines try to find a warehouse.
    pub warehouse_strategies: Vec<WarehouseStrategy>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_warehouse_code: "MAIN".to_string(),
            fallback_warehouse_id: WarehouseId::new(1),
            raw_materials_warehouse_code: "RAW".to_string(),
            finished_goods_warehouse_code: "FG".to_string(),
            warehouse_strategies: WarehouseStrategy::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl LedgerConfig {
    /// Overlay `BIZBOOKS_*` environment variables onto the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(code) = env_var("BIZBOOKS_DEFAULT_WAREHOUSE") {
            cfg.default_warehouse_code = code;
        }
        if let Some(id) = parse_env::<WarehouseId>("BIZBOOKS_FALLBACK_WAREHOUSE_ID")? {
            cfg.fallback_warehouse_id = id;
        }
        if let Some(code) = env_var("BIZBOOKS_RAW_WAREHOUSE") {
            cfg.raw_materials_warehouse_code = code;
        }
        if let Some(code) = env_var("BIZBOOKS_FG_WAREHOUSE") {
            cfg.finished_goods_warehouse_code = code;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Non-empty, trimmed value of an environment variable.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional environment variable; present but malformed is an error.
pub fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// `1/true/yes/on` or `0/false/no/off`, case-insensitive.
pub fn parse_flag(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}

/// Batching parameters for the activity log writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityLogConfig {
    pub enabled: bool,
    /// Flush once this many entries are buffered.
    pub batch_size: usize,
    /// Flush whatever is buffered at least this often.
    pub flush_interval: Duration,
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
        }
    }
}

impl ActivityLogConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(enabled) = parse_flag("BIZBOOKS_ACTIVITY_LOG")? {
            cfg.enabled = enabled;
        }
        if let Some(n) = parse_env::<usize>("BIZBOOKS_ACTIVITY_BATCH_SIZE")? {
            if n == 0 {
                return Err(ConfigError::Invalid {
                    name: "BIZBOOKS_ACTIVITY_BATCH_SIZE",
                    value: n.to_string(),
                });
            }
            cfg.batch_size = n;
        }
        if let Some(ms) = parse_env::<u64>("BIZBOOKS_ACTIVITY_FLUSH_MS")? {
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    name: "BIZBOOKS_ACTIVITY_FLUSH_MS",
                    value: ms.to_string(),
                });
            }
            cfg.flush_interval = Duration::from_millis(ms);
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.default_warehouse_code, "MAIN");
        assert_eq!(cfg.fallback_warehouse_id, WarehouseId::new(1));
        assert_eq!(cfg.warehouse_strategies.first(), Some(&WarehouseStrategy::Explicit));

        let log = ActivityLogConfig::default();
        assert_eq!(log.batch_size, 50);
        assert_eq!(log.flush_interval, Duration::from_secs(5));
        assert!(!ActivityLogConfig::disabled().enabled);
    }

    #[test]
    fn malformed_values_are_rejected() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("BIZBOOKS_TEST_CONFIG_FLAG", "maybe") };
        assert_eq!(
            parse_flag("BIZBOOKS_TEST_CONFIG_FLAG"),
            Err(ConfigError::Invalid {
                name: "BIZBOOKS_TEST_CONFIG_FLAG",
                value: "maybe".to_string(),
            })
        );
        unsafe { std::env::set_var("BIZBOOKS_TEST_CONFIG_FLAG", "Off") };
        assert_eq!(parse_flag("BIZBOOKS_TEST_CONFIG_FLAG"), Ok(Some(false)));
        assert_eq!(parse_env::<u64>("BIZBOOKS_TEST_CONFIG_UNSET"), Ok(None));
    }
}
