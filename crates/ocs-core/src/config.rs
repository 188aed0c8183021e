//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::OcsError;
use crate::models::{dynamic_decimal_opts_from_pairs, DynamicDecimalOpt};
use crate::OcsResult;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub charging: ChargingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub filters: Vec<FilterProfileConfig>,
}

/// Node-wide settings
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// Tenant used for events that do not carry one
    #[serde(default = "default_tenant")]
    pub default_tenant: String,

    /// Identifier of this node in logs
    #[serde(default = "default_node_id")]
    pub node_id: String,
}

fn default_tenant() -> String {
    "ocs.local".to_string()
}

fn default_node_id() -> String {
    "ocs-node".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_tenant: default_tenant(),
            node_id: default_node_id(),
        }
    }
}

/// Charging engine settings
#[derive(Debug, Deserialize, Clone)]
pub struct ChargingConfig {
    /// Maximum charge requests processed at once (-1 = unbounded)
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: i32,

    /// Maximum wait for a balance lock in milliseconds (0 = wait indefinitely)
    #[serde(default)]
    pub lock_timeout_ms: u64,

    /// Default debit increments, first entry whose filters pass wins
    #[serde(default)]
    pub increments: Vec<IncrementEntry>,

    /// Balance snapshot loaded by the charger binary
    #[serde(default)]
    pub balances_path: Option<String>,

    /// Where the charger writes the balances after the batch, unset to skip
    #[serde(default)]
    pub snapshot_out_path: Option<String>,
}

/// One default-increment entry
#[derive(Debug, Deserialize, Clone)]
pub struct IncrementEntry {
    /// `;`-separated filter IDs, empty for the fallback entry
    #[serde(default)]
    pub filter_ids: String,

    /// Decimal literal
    pub value: String,
}

fn default_concurrent_requests() -> i32 {
    -1
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            concurrent_requests: default_concurrent_requests(),
            lock_timeout_ms: 0,
            increments: Vec::new(),
            balances_path: None,
            snapshot_out_path: None,
        }
    }
}

impl ChargingConfig {
    /// Concurrency cap, `None` when unbounded
    pub fn concurrency_limit(&self) -> Option<usize> {
        usize::try_from(self.concurrent_requests).ok()
    }

    /// Lock timeout, `None` when waiting indefinitely
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }

    /// Parsed default increments
    pub fn increment_opts(&self) -> OcsResult<Vec<DynamicDecimalOpt>> {
        dynamic_decimal_opts_from_pairs(
            self.increments
                .iter()
                .map(|entry| (entry.filter_ids.as_str(), entry.value.as_str())),
        )
    }
}

/// Named filter profile served by the in-memory filter service
#[derive(Debug, Deserialize, Clone)]
pub struct FilterProfileConfig {
    /// Owning tenant, `general.default_tenant` when absent
    #[serde(default)]
    pub tenant: Option<String>,

    pub id: String,

    /// Inline rules that must all pass, e.g. `*string:~*req.Account:1001`
    pub rules: Vec<String>,
}

/// Logging settings
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config files
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        tracing::debug!("Loading configuration for run mode {}", run_mode);

        let config = Config::builder()
            // Start with default values
            .set_default("general.default_tenant", default_tenant())?
            .set_default("general.node_id", default_node_id())?
            .set_default("charging.concurrent_requests", -1)?
            .set_default("charging.lock_timeout_ms", 0)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            // Load config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Environment variables with OCS_ prefix, e.g. OCS_CHARGING__CONCURRENT_REQUESTS
            .add_source(
                Environment::with_prefix("OCS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("OCS").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> OcsResult<()> {
        if self.charging.concurrent_requests == 0 || self.charging.concurrent_requests < -1 {
            return Err(OcsError::Config(format!(
                "charging.concurrent_requests must be -1 or positive, got {}",
                self.charging.concurrent_requests
            )));
        }
        if self.general.default_tenant.trim().is_empty() {
            return Err(OcsError::Config(
                "general.default_tenant must not be empty".to_string(),
            ));
        }
        self.charging.increment_opts()?;
        Ok(())
    }
}
