//! Config file loading.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load a config from a specific file path.
///
/// Omitted keys keep their defaults; blank values are filled by
/// [`Config::apply_defaults`] before validation.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, is too large,
/// cannot be parsed, or fails validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let mut config = if content.trim().is_empty() {
        debug!(path = %path.display(), "config file is empty, using defaults");
        Config::default()
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?
    };

    config.apply_defaults();
    validate::validate(&config)?;

    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load a config file, returning defaults together with the error on failure.
#[must_use]
pub fn load_or_default(path: &Path) -> (Config, Option<ConfigError>) {
    match load_file(path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    }
}
