//! # Runtime Configuration Module
//!
//! Process-wide settings fixed when the application is constructed.
//!
//! ## Environment Variables
//!
//! ### `GWR_DEBUG`
//!
//! Enables debug error bodies: unclassified failures return their message
//! and a backtrace instead of the generic payload. Accepts `1`, `true`,
//! `yes` or `on` (case-insensitive). Default: off.
//!
//! ### `GWR_LOG_LEVEL`, `GWR_LOG_FORMAT`, `GWR_LOG_ASYNC`, `GWR_LOG_TARGET_FILTER`
//!
//! See [`LogConfig::from_env`].
//!
//! ## Usage
//!
//! ```rust
//! use gwrouter::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_yaml_str("debug: true\nlog:\n  format: pretty\n").unwrap();
//! assert!(config.debug);
//! assert_eq!(config.log.level, "info");
//! ```

use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Expose fault messages and traces in 500 bodies.
    pub debug: bool,
    pub log: LogConfig,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            debug: env::var("GWR_DEBUG").is_ok_and(|v| parse_flag(&v)),
            log: LogConfig::from_env(),
        }
    }

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse runtime configuration")
    }
}

/// Truthy environment flag.
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
