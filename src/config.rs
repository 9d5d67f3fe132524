//! Runtime configuration for the orchestration core.
//!
//! Defaults cover local development; every field can be overridden through
//! `PROVISOR_*` environment variables (e.g. `PROVISOR_POLL_INTERVAL_MS`).

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{ProvisorError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisorConfig {
    /// Maximum time an order may stay IN_PROGRESS before the re-fetcher
    /// queries the deployer for a lost result, in seconds.
    pub max_order_processing_duration_secs: u64,
    /// Sleep between store reads in the long-poll loops, in milliseconds.
    pub poll_interval_ms: u64,
    /// Default deadline for long-poll callers, in seconds.
    pub long_poll_timeout_secs: u64,
    /// Upper bound on concurrently dispatched deployer operations.
    pub max_concurrent_orders: usize,
    /// Placeholder written over sensitive variable values.
    pub sensitive_value_placeholder: String,
}

impl Default for ProvisorConfig {
    fn default() -> Self {
        Self {
            max_order_processing_duration_secs: 3600,
            poll_interval_ms: 500,
            long_poll_timeout_secs: 60,
            max_concurrent_orders: 10,
            sensitive_value_placeholder: "**********".to_string(),
        }
    }
}

impl ProvisorConfig {
    /// Load configuration from the environment on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let loaded = Config::builder()
            .add_source(Environment::with_prefix("PROVISOR").try_parsing(true))
            .build()
            .map_err(|e| ProvisorError::Configuration(e.to_string()))?;
        loaded
            .try_deserialize()
            .map_err(|e| ProvisorError::Configuration(e.to_string()))
    }
}
