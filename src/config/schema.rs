//! Configuration schema for the sequencer.
//!
//! All settings are optional in the settings file; missing ones fall back to
//! the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default API root requests are built against.
pub const DEFAULT_BASE_URL: &str = "https://app.asana.com/api/1.0";

/// Sequencer settings, read from the `rest-sequencer` key of a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencerConfig {
    /// API root that endpoint paths are appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    ///
    /// Covers connection, headers and body download. Must be greater than 0.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    /// Only used when `follow_redirects` is true. Zero disables redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Whether to validate TLS certificates.
    #[serde(default = "default_validate_ssl")]
    pub validate_ssl: bool,

    /// Headers sent with every request. `Accept` and `Authorization` set by
    /// the executor take precedence.
    #[serde(default = "default_headers")]
    pub default_headers: HashMap<String, String>,

    /// Key-value storage file for the bearer token. `None` uses
    /// `~/.config/rest-sequencer/storage.json`.
    #[serde(default)]
    pub storage_file: Option<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            follow_redirects: default_follow_redirects(),
            max_redirects: default_max_redirects(),
            validate_ssl: default_validate_ssl(),
            default_headers: default_headers(),
            storage_file: None,
        }
    }
}

impl SequencerConfig {
    /// Returns a description of the first invalid setting, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        let base = url::Url::parse(&self.base_url)
            .map_err(|e| format!("baseUrl is not a valid URL: {}", e))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(format!("baseUrl must use http or https, got '{}'", base.scheme()));
        }

        Ok(())
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30000
}

fn default_follow_redirects() -> bool {
    true
}

fn default_max_redirects() -> u32 {
    10
}

fn default_validate_ssl() -> bool {
    true
}

fn default_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        "User-Agent".to_string(),
        concat!("rest-sequencer/", env!("CARGO_PKG_VERSION")).to_string(),
    );
    headers
}
