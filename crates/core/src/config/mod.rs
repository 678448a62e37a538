//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MODELVIEW_*)
//! 2. TOML config file (if MODELVIEW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CAPACITY_BYTES;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MODELVIEW_*)
/// 2. TOML config file (if MODELVIEW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via MODELVIEW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Byte budget for the asset cache.
    ///
    /// Set via MODELVIEW_CAPACITY_BYTES environment variable.
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,

    /// Base URL of the model share service.
    ///
    /// Set via MODELVIEW_API_BASE_URL environment variable.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MODELVIEW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via MODELVIEW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to download per asset file.
    ///
    /// Set via MODELVIEW_MAX_FETCH_BYTES environment variable.
    #[serde(default = "default_max_fetch_bytes")]
    pub max_fetch_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./modelview-cache.sqlite")
}

fn default_capacity_bytes() -> u64 {
    DEFAULT_CAPACITY_BYTES
}

fn default_api_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "modelview/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_fetch_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            capacity_bytes: default_capacity_bytes(),
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_fetch_bytes: default_max_fetch_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MODELVIEW_`
    /// 2. TOML file from `MODELVIEW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MODELVIEW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MODELVIEW_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
