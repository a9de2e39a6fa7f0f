//! Transport configuration.
//!
//! Derived from [`SequencerConfig`]; holds only what the HTTP client needs.

use crate::config::SequencerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for HTTP request execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Request timeout in milliseconds, covering connect, headers and body.
    pub timeout_ms: u64,

    pub follow_redirects: bool,

    pub max_redirects: u32,

    pub validate_ssl: bool,

    /// Headers added to every request before the per-request ones.
    pub default_headers: HashMap<String, String>,
}

impl ExecutionConfig {
    /// Creates a config with the given timeout and default everything else.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }

    /// Returns the timeout as a `Duration`.
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::from(&SequencerConfig::default())
    }
}

impl From<&SequencerConfig> for ExecutionConfig {
    fn from(config: &SequencerConfig) -> Self {
        Self {
            timeout_ms: config.timeout,
            follow_redirects: config.follow_redirects,
            max_redirects: config.max_redirects,
            validate_ssl: config.validate_ssl,
            default_headers: config.default_headers.clone(),
        }
    }
}
