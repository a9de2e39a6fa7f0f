//! Configuration loading.
//!
//! Settings live under the `rest-sequencer` key of a JSON settings document.
//! User values are merged over the defaults field by field and the result is
//! validated. A settings section that fails to deserialize is logged and
//! replaced by the defaults; a section that deserializes but fails validation
//! is an error.

pub mod schema;

pub use schema::{SequencerConfig, DEFAULT_BASE_URL};

use log::warn;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Key of the sequencer's section in a settings document.
pub const SETTINGS_KEY: &str = "rest-sequencer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a settings document.
///
/// # Example
///
/// ```
/// use rest_sequencer::config::load_config;
/// use serde_json::json;
///
/// let settings = json!({
///     "rest-sequencer": {
///         "timeout": 60000,
///         "validateSsl": false
///     }
/// });
///
/// let config = load_config(Some(settings)).unwrap();
/// assert_eq!(config.timeout, 60000);
/// ```
pub fn load_config(settings_json: Option<Value>) -> Result<SequencerConfig, ConfigError> {
    let mut config = SequencerConfig::default();

    if let Some(section) = settings_json.as_ref().and_then(|s| s.get(SETTINGS_KEY)) {
        match serde_json::from_value::<SequencerConfig>(section.clone()) {
            Ok(user_config) => config = user_config,
            Err(e) => warn!(
                "Failed to parse {} settings: {}. Using defaults.",
                SETTINGS_KEY, e
            ),
        }
    }

    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Loads configuration from a JSON settings file.
pub fn load_config_file(path: &Path) -> Result<SequencerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let settings: Value = serde_json::from_str(&content)?;
    load_config(Some(settings))
}
